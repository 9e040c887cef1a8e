//! Scene cameras and their interactive reconfiguration.

use std::f32::consts::FRAC_PI_3;

use lumen_math::{Quat, Vec3};

/// Field of view shared by every scene camera.
pub const CAMERA_FOV: f32 = FRAC_PI_3;

/// Number of post effects the kernel understands (selector values 0..N).
pub const EFFECT_COUNT: u32 = 9;

/// Camera for progressive rendering
///
/// `position`, `direction` and `up` come from the scene file; everything
/// else is derived by [`Camera::reconfigure`] or adjusted interactively.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub position: Vec3,
    pub direction: Vec3,
    pub up: Vec3,
    pub fov: f32,

    // Runtime-only state
    pub left: Vec3,
    pub focal_length: f32,
    pub aperture: f32,
    pub aspect: f32,
    pub half_width: f32,
    pub half_height: f32,
    pub brightness: f32,
    pub dust: f32,
    pub refraction: f32,
    pub filter: Vec3,
    pub effect: u32,
    pub resolution: (u32, u32),
}

impl Camera {
    /// Create a camera from its scene-file fields with default optics.
    pub fn new(position: Vec3, direction: Vec3, up: Vec3) -> Self {
        Self {
            position,
            direction: direction.normalize(),
            up,
            fov: CAMERA_FOV,
            left: Vec3::X,
            focal_length: 1.0,
            aperture: 0.0,
            aspect: 1.0,
            half_width: 0.0,
            half_height: 0.0,
            brightness: 1.0,
            dust: 0.0,
            refraction: 1.0,
            filter: Vec3::ONE,
            effect: 0,
            resolution: (1, 1),
        }
    }

    /// Derive the runtime fields for a render target of the given size.
    ///
    /// Re-orthonormalizes `up` against `direction` and recomputes the
    /// projection plane half-extents from the field of view.
    pub fn reconfigure(&mut self, width: u32, height: u32) {
        let width = width.max(1);
        let height = height.max(1);
        self.resolution = (width, height);
        self.aspect = width as f32 / height as f32;

        let direction = self.direction.try_normalize().unwrap_or(Vec3::NEG_Z);
        // up parallel to direction: any perpendicular axis will do
        let left = self
            .up
            .cross(direction)
            .try_normalize()
            .unwrap_or_else(|| direction.any_orthonormal_vector());
        self.direction = direction;
        self.left = left;
        self.up = direction.cross(left).normalize();

        self.half_width = (self.fov * 0.5).tan() * self.focal_length;
        self.half_height = self.half_width / self.aspect;
    }

    /// Move the camera in its own frame (right, up, forward).
    pub fn translate_local(&mut self, right: f32, up: f32, forward: f32) {
        self.position += self.direction * forward - self.left * right + self.up * up;
    }

    /// Rotate around the camera's up axis (yaw) and left axis (pitch).
    pub fn rotate(&mut self, yaw: f32, pitch: f32) {
        let rotation = Quat::from_axis_angle(self.up, yaw) * Quat::from_axis_angle(self.left, pitch);
        self.direction = (rotation * self.direction).normalize();
        self.up = (rotation * self.up).normalize();
        let (width, height) = self.resolution;
        self.reconfigure(width, height);
    }
}
