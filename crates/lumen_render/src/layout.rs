//! Fixed-layout GPU records.
//!
//! Every struct here mirrors a WGSL declaration in the render kernel and
//! follows storage/uniform buffer layout rules: a `vec3<f32>` is 16-byte
//! aligned, so each one is followed by a 4-byte scalar.

use bytemuck::{Pod, Zeroable};
use lumen_core::{Camera, Image, SceneObject, Shape};
use lumen_math::Vec3Ext;

/// Size in bytes of one packed object record.
pub const OBJECT_STRIDE: usize = 192;

/// Words of per-image header in a packed image buffer.
pub const IMAGE_HEADER_WORDS: usize = 4;

/// One primitive as the kernel reads it.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct GpuObject {
    pub position: [f32; 3],
    pub kind: u32,
    pub direction: [f32; 3],
    pub radius: f32,
    pub color: [f32; 3],
    pub reflection: f32,
    pub emission: [f32; 3],
    pub distance: f32,
    pub basis_x: [f32; 3],
    pub texture: u32,
    pub basis_y: [f32; 3],
    pub normal: u32,
    pub basis_z: [f32; 3],
    pub id: u32,
    pub vertex_a: [f32; 3],
    pub _pad0: f32,
    pub vertex_b: [f32; 3],
    pub _pad1: f32,
    pub vertex_c: [f32; 3],
    pub _pad2: f32,
    pub shift: [f32; 2],
    pub rotation: [f32; 2],
    pub prolapse: [f32; 2],
    pub _pad3: [f32; 2],
}

impl From<&SceneObject> for GpuObject {
    fn from(object: &SceneObject) -> Self {
        let surface = &object.surface;
        let (distance, vertices) = match object.shape {
            Shape::Plane { distance } => (distance, [[0.0; 3]; 3]),
            Shape::Triangle { vertices } => {
                (0.0, [vertices[0].to_gpu(), vertices[1].to_gpu(), vertices[2].to_gpu()])
            }
            _ => (0.0, [[0.0; 3]; 3]),
        };

        Self {
            position: object.position.to_gpu(),
            kind: object.kind() as u32,
            direction: object.direction.to_gpu(),
            radius: object.shape.radius(),
            color: surface.color.to_gpu(),
            reflection: surface.reflection,
            emission: surface.emission.to_gpu(),
            distance,
            basis_x: object.basis.x.to_gpu(),
            texture: surface.texture,
            basis_y: object.basis.y.to_gpu(),
            normal: surface.normal,
            basis_z: object.basis.z.to_gpu(),
            id: object.id,
            vertex_a: vertices[0],
            vertex_b: vertices[1],
            vertex_c: vertices[2],
            shift: surface.shift.to_array(),
            rotation: surface.rotation.to_array(),
            prolapse: surface.prolapse.to_array(),
            ..Default::default()
        }
    }
}

/// Pack a scene's objects into kernel records.
///
/// An empty scene yields a single zeroed record so the storage buffer is
/// never zero-sized; the object count argument still says 0.
pub fn pack_objects(objects: &[SceneObject]) -> Vec<GpuObject> {
    if objects.is_empty() {
        return vec![GpuObject::zeroed()];
    }
    objects.iter().map(GpuObject::from).collect()
}

/// Camera record bound as a uniform.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct GpuCamera {
    pub position: [f32; 3],
    pub fov: f32,
    pub direction: [f32; 3],
    pub focal_length: f32,
    pub up: [f32; 3],
    pub aperture: f32,
    pub left: [f32; 3],
    pub aspect: f32,
    pub filter: [f32; 3],
    pub brightness: f32,
    pub half_width: f32,
    pub half_height: f32,
    pub dust: f32,
    pub refraction: f32,
    pub effect: u32,
    pub width: u32,
    pub height: u32,
    pub _pad: u32,
}

impl From<&Camera> for GpuCamera {
    fn from(camera: &Camera) -> Self {
        Self {
            position: camera.position.to_gpu(),
            fov: camera.fov,
            direction: camera.direction.to_gpu(),
            focal_length: camera.focal_length,
            up: camera.up.to_gpu(),
            aperture: camera.aperture,
            left: camera.left.to_gpu(),
            aspect: camera.aspect,
            filter: camera.filter.to_gpu(),
            brightness: camera.brightness,
            half_width: camera.half_width,
            half_height: camera.half_height,
            dust: camera.dust,
            refraction: camera.refraction,
            effect: camera.effect,
            width: camera.resolution.0,
            height: camera.resolution.1,
            _pad: 0,
        }
    }
}

/// A single `u32` uniform padded to the 16-byte uniform granularity.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct ScalarUniform {
    pub value: u32,
    pub _pad: [u32; 3],
}

impl ScalarUniform {
    pub fn new(value: u32) -> Self {
        Self { value, _pad: [0; 3] }
    }
}

/// Pack registry images into one word buffer.
///
/// Layout: `(width, height, offset, 0)` per image, then the pixels of every
/// image back to back. `offset` is the word index of the image's first pixel.
pub fn pack_images(images: &[Image]) -> Vec<u32> {
    let header_len = images.len() * IMAGE_HEADER_WORDS;
    let pixel_len: usize = images.iter().map(|img| img.pixels.len()).sum();

    let mut words = Vec::with_capacity(header_len + pixel_len.max(1));
    let mut offset = header_len as u32;
    for image in images {
        words.extend_from_slice(&[image.width, image.height, offset, 0]);
        offset += image.pixels.len() as u32;
    }
    for image in images {
        words.extend_from_slice(&image.pixels);
    }

    if words.is_empty() {
        words.push(0);
    }
    words
}
