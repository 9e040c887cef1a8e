//! JSON scene description parser.
//!
//! Compiles a nested scene document into a flat, id-ordered object list.
//! Composed nodes are resolved by a recursive flatten pass: the offsets they
//! contribute travel down the call stack and only primitives are appended
//! to the output.
//!
//! # Document layout
//!
//! ```text
//! {
//!   "textures": ["brick.png", ...],
//!   "normals":  ["brick_n.png", ...],
//!   "objects":  [{ "type": "sphere", "position": [0, 1, 0], ... },
//!                { "type": "composed", "position": [..], "dir": [..],
//!                  "objects": [ ... ] }],
//!   "cameras":  [{ "position": [..], "dir": [..], "normal": [..] }]
//! }
//! ```

use lumen_math::{derived_x_axis, Basis, Vec2, Vec3, Vec3Ext};
use serde_json::{Map, Value};

use crate::camera::{Camera, EFFECT_COUNT};
use crate::error::{SceneError, SceneResult};
use crate::object::{ObjectKind, SceneObject, Shape, Surface, DEFAULT_PROLAPSE};
use crate::registry::ResourceRegistry;
use crate::scene::Scene;

/// Type tag of grouping nodes.
const COMPOSED_TAG: &str = "composed";

/// Direction used when a combined direction has no length.
const FALLBACK_DIRECTION: Vec3 = Vec3::Y;

/// Offsets inherited from enclosing composed nodes.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct Composition {
    position: Vec3,
    direction: Vec3,
}

impl Composition {
    /// Stack a nested composed node's own offsets on top of this one.
    fn nest(self, position: Vec3, direction: Vec3) -> Self {
        Self {
            position: self.position + position,
            direction: self.direction + direction,
        }
    }
}

/// Typed accessors over one JSON node, reporting errors against `object`.
struct Fields<'a> {
    map: &'a Map<String, Value>,
    object: &'a str,
}

impl<'a> Fields<'a> {
    fn new(node: &'a Value, object: &'a str, field: &'static str) -> SceneResult<Self> {
        let map = node.as_object().ok_or_else(|| SceneError::MalformedField {
            field,
            object: object.to_string(),
        })?;
        Ok(Self { map, object })
    }

    fn get(&self, field: &str) -> Option<&'a Value> {
        self.map.get(field).filter(|v| !v.is_null())
    }

    fn missing(&self, field: &'static str) -> SceneError {
        SceneError::MissingRequiredField {
            field,
            object: self.object.to_string(),
        }
    }

    fn malformed(&self, field: &'static str) -> SceneError {
        SceneError::MalformedField {
            field,
            object: self.object.to_string(),
        }
    }

    fn components<const N: usize>(&self, field: &'static str) -> SceneResult<Option<[f32; N]>> {
        let Some(value) = self.get(field) else {
            return Ok(None);
        };
        let malformed = || SceneError::MalformedVector {
            field,
            object: self.object.to_string(),
        };

        let items = value.as_array().ok_or_else(malformed)?;
        if items.len() != N {
            return Err(malformed());
        }

        let mut out = [0.0f32; N];
        for (slot, item) in out.iter_mut().zip(items) {
            let number = item.as_f64().ok_or_else(malformed)? as f32;
            if !number.is_finite() {
                return Err(malformed());
            }
            *slot = number;
        }
        Ok(Some(out))
    }

    fn vec3(&self, field: &'static str) -> SceneResult<Option<Vec3>> {
        Ok(self.components::<3>(field)?.map(Vec3::from_array))
    }

    fn require_vec3(&self, field: &'static str) -> SceneResult<Vec3> {
        self.vec3(field)?.ok_or_else(|| self.missing(field))
    }

    fn vec2(&self, field: &'static str) -> SceneResult<Option<Vec2>> {
        Ok(self.components::<2>(field)?.map(Vec2::from_array))
    }

    fn number(&self, field: &'static str) -> SceneResult<Option<f32>> {
        match self.get(field) {
            None => Ok(None),
            Some(value) => value
                .as_f64()
                .map(|n| Some(n as f32))
                .ok_or_else(|| self.malformed(field)),
        }
    }

    fn string(&self, field: &'static str) -> SceneResult<Option<&'a str>> {
        match self.get(field) {
            None => Ok(None),
            Some(value) => value.as_str().map(Some).ok_or_else(|| self.malformed(field)),
        }
    }

    fn list(&self, field: &'static str) -> SceneResult<&'a [Value]> {
        match self.get(field) {
            None => Ok(&[]),
            Some(value) => value
                .as_array()
                .map(Vec::as_slice)
                .ok_or_else(|| self.malformed(field)),
        }
    }
}

/// Scene compiler state for one document.
pub struct SceneParser<'r> {
    textures: &'r mut ResourceRegistry,
    normals: &'r mut ResourceRegistry,
    frame_size: (u32, u32),
}

impl<'r> SceneParser<'r> {
    /// Create a parser that resolves names against the given registries and
    /// configures cameras for a `frame_size` render target.
    pub fn new(
        textures: &'r mut ResourceRegistry,
        normals: &'r mut ResourceRegistry,
        frame_size: (u32, u32),
    ) -> Self {
        Self {
            textures,
            normals,
            frame_size,
        }
    }

    /// Parse a scene document from JSON text.
    pub fn parse_str(&mut self, content: &str) -> SceneResult<Scene> {
        let document: Value = serde_json::from_str(content)?;
        self.parse(&document)
    }

    /// Parse a scene document.
    ///
    /// Resource lists are registered first so that object references can be
    /// resolved; then objects are flattened and cameras configured.
    pub fn parse(&mut self, document: &Value) -> SceneResult<Scene> {
        let root = Fields::new(document, "scene", "document")?;

        let texture_names = Self::names(&root, "textures")?;
        for name in &texture_names {
            self.textures.register(name)?;
        }
        let normal_names = Self::names(&root, "normals")?;
        for name in &normal_names {
            self.normals.register(name)?;
        }

        let mut objects = Vec::new();
        for node in root.list("objects")? {
            self.flatten(node, Composition::default(), &mut objects)?;
        }

        let mut cameras = Vec::new();
        for node in root.list("cameras")? {
            cameras.push(self.parse_camera(node)?);
        }
        if cameras.is_empty() {
            return Err(SceneError::NoCameras);
        }

        Ok(Scene {
            objects,
            cameras,
            texture_names,
            normal_names,
        })
    }

    fn names(root: &Fields<'_>, field: &'static str) -> SceneResult<Vec<String>> {
        root.list(field)?
            .iter()
            .map(|v| {
                v.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| root.malformed(field))
            })
            .collect()
    }

    /// Resolve one object node, appending any primitives it yields to `out`.
    fn flatten(
        &mut self,
        node: &Value,
        composition: Composition,
        out: &mut Vec<SceneObject>,
    ) -> SceneResult<()> {
        let untyped = Fields::new(node, "object", "objects")?;
        let tag = untyped.string("type")?.ok_or_else(|| untyped.missing("type"))?;

        if tag == COMPOSED_TAG {
            let fields = Fields::new(node, COMPOSED_TAG, "objects")?;
            let nested = composition.nest(
                fields.vec3("position")?.unwrap_or(Vec3::ZERO),
                fields.vec3("dir")?.unwrap_or(Vec3::ZERO),
            );
            for child in fields.list("objects")? {
                self.flatten(child, nested, out)?;
            }
            return Ok(());
        }

        let kind =
            ObjectKind::from_tag(tag).ok_or_else(|| SceneError::UnknownObjectType(tag.to_string()))?;
        let id = out.len() as u32;
        let object = self.parse_primitive(node, kind, id, composition)?;
        out.push(object);
        Ok(())
    }

    fn parse_primitive(
        &mut self,
        node: &Value,
        kind: ObjectKind,
        id: u32,
        composition: Composition,
    ) -> SceneResult<SceneObject> {
        let fields = Fields::new(node, kind.tag(), "objects")?;

        // Required geometry
        let local_position = if kind.requires_position() {
            Some(fields.require_vec3("position")?)
        } else {
            fields.vec3("position")?
        };
        let local_direction = if kind.requires_direction() {
            fields.require_vec3("dir")?
        } else {
            fields.vec3("dir")?.unwrap_or(Vec3::ZERO)
        };
        let color = fields.require_vec3("color")?;
        let radius = if kind.requires_radius() {
            Some(fields.number("radius")?.ok_or_else(|| fields.missing("radius"))?)
        } else {
            fields.number("radius")?
        };

        let mut direction = local_direction.sum_normalized(composition.direction, FALLBACK_DIRECTION);

        let shape = match kind {
            ObjectKind::Sphere => Shape::Sphere {
                radius: radius.unwrap_or_default(),
            },
            ObjectKind::Cylinder => Shape::Cylinder {
                radius: radius.unwrap_or_default(),
            },
            ObjectKind::Cone => Shape::Cone {
                radius: radius.unwrap_or_default(),
            },
            ObjectKind::Plane => Shape::Plane { distance: 0.0 },
            ObjectKind::Triangle => {
                let vertices = [
                    fields.require_vec3("a")? + composition.position,
                    fields.require_vec3("b")? + composition.position,
                    fields.require_vec3("c")? + composition.position,
                ];
                direction = triangle_normal(&vertices);
                Shape::Triangle { vertices }
            }
        };

        let position = match (local_position, &shape) {
            (Some(p), _) => p + composition.position,
            (None, Shape::Triangle { vertices }) => (vertices[0] + vertices[1] + vertices[2]) / 3.0,
            (None, _) => composition.position,
        };

        let shape = match shape {
            Shape::Plane { .. } => Shape::Plane {
                distance: fields
                    .number("distance")?
                    .unwrap_or_else(|| direction.dot(position)),
            },
            other => other,
        };

        let surface = self.parse_surface(&fields, color)?;
        let basis = parse_basis(&fields, kind, direction)?;

        Ok(SceneObject {
            id,
            position,
            direction,
            basis,
            surface,
            shape,
        })
    }

    fn parse_surface(&mut self, fields: &Fields<'_>, color: Vec3) -> SceneResult<Surface> {
        let emission = match fields.vec3("emition")? {
            Some(e) => e,
            None => fields.vec3("emission")?.unwrap_or(Vec3::ZERO),
        };

        let texture = resolve_field(fields, "texture", self.textures)?;
        let normal = resolve_field(fields, "normal", self.normals)?;

        Ok(Surface {
            color,
            emission,
            reflection: fields.number("reflection")?.unwrap_or(0.0),
            texture,
            normal,
            shift: fields.vec2("shift")?.unwrap_or(Vec2::ZERO),
            rotation: fields.vec2("rotation")?.unwrap_or(Vec2::ZERO),
            prolapse: fields.vec2("prolapse")?.unwrap_or(DEFAULT_PROLAPSE),
        })
    }

    fn parse_camera(&mut self, node: &Value) -> SceneResult<Camera> {
        let fields = Fields::new(node, "camera", "cameras")?;

        let position = fields.require_vec3("position")?;
        let direction = fields.require_vec3("dir")?;
        if direction.length_squared() == 0.0 {
            return Err(SceneError::MalformedVector {
                field: "dir",
                object: "camera".to_string(),
            });
        }
        let up = fields.vec3("normal")?.unwrap_or(Vec3::Y);

        let mut camera = Camera::new(position, direction, up);
        if let Some(v) = fields.number("focal_length")? {
            camera.focal_length = v;
        }
        if let Some(v) = fields.number("aperture")? {
            camera.aperture = v;
        }
        if let Some(v) = fields.number("brightness")? {
            camera.brightness = v;
        }
        if let Some(v) = fields.number("dust")? {
            camera.dust = v;
        }
        if let Some(v) = fields.number("refraction")? {
            camera.refraction = v;
        }
        if let Some(v) = fields.number("effect")? {
            camera.effect = (v.max(0.0) as u32).min(EFFECT_COUNT - 1);
        }
        if let Some(v) = fields.vec3("filter")? {
            camera.filter = v;
        }

        camera.reconfigure(self.frame_size.0, self.frame_size.1);
        Ok(camera)
    }
}

/// Look up a name, degrading to the default index 0 when it is unknown.
fn resolve_reference(registry: &ResourceRegistry, name: &str, object: &str) -> u32 {
    registry.lookup(name).unwrap_or_else(|| {
        log::warn!("{}: unresolved reference '{}', using default", object, name);
        0
    })
}

/// Numeric slots are used as-is when they are in range.
fn resolve_slot(registry: &ResourceRegistry, raw: f64, field: &str, object: &str) -> u32 {
    if raw >= 0.0 && raw < registry.len() as f64 {
        raw as u32
    } else {
        log::warn!("{}: {} slot {} out of range, using default", object, field, raw);
        0
    }
}

/// A texture or normal reference given by name or by slot. Absent means 0.
fn resolve_field(
    fields: &Fields<'_>,
    field: &'static str,
    registry: &ResourceRegistry,
) -> SceneResult<u32> {
    match fields.get(field) {
        None => Ok(0),
        Some(Value::String(name)) => Ok(resolve_reference(registry, name, fields.object)),
        Some(value) => {
            let raw = value.as_f64().ok_or_else(|| fields.malformed(field))?;
            Ok(resolve_slot(registry, raw, field, fields.object))
        }
    }
}

/// Orientation of a triangle: `normalize((b - a) x (c - a))`.
pub fn triangle_normal(vertices: &[Vec3; 3]) -> Vec3 {
    let ab = vertices[1] - vertices[0];
    let ac = vertices[2] - vertices[0];
    ab.cross(ac).try_normalize().unwrap_or(FALLBACK_DIRECTION)
}

/// Resolve the basis triple from explicit axes or the orientation direction.
fn parse_basis(fields: &Fields<'_>, kind: ObjectKind, direction: Vec3) -> SceneResult<Basis> {
    let x = match fields.vec3("x_basis")? {
        Some(x) => x,
        None => derived_x_axis(direction),
    };

    let y = match fields.vec3("y_basis")? {
        Some(y) => y,
        None => match kind {
            ObjectKind::Sphere => direction,
            ObjectKind::Cylinder => x.cross(direction),
            ObjectKind::Cone | ObjectKind::Plane | ObjectKind::Triangle => direction.cross(x),
        },
    };
    let z = match fields.vec3("z_basis")? {
        Some(z) => z,
        None => match kind {
            ObjectKind::Cylinder => direction,
            _ => x.cross(y),
        },
    };

    Ok(Basis::new(x, y, z))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::tests::CountingDecoder;

    fn registries() -> (ResourceRegistry, ResourceRegistry) {
        let (textures, _) = CountingDecoder::new();
        let (normals, _) = CountingDecoder::new();
        (
            ResourceRegistry::textures(Box::new(textures)),
            ResourceRegistry::normals(Box::new(normals)),
        )
    }

    fn parse(json: &str) -> SceneResult<Scene> {
        let (mut textures, mut normals) = registries();
        SceneParser::new(&mut textures, &mut normals, (800, 600)).parse_str(json)
    }

    const CAMERA: &str = r#""cameras": [{ "position": [0, 0, 5], "dir": [0, 0, -1] }]"#;

    fn scene_with(objects: &str) -> String {
        format!(r#"{{ "objects": [{}], {} }}"#, objects, CAMERA)
    }

    fn close(a: Vec3, b: Vec3) -> bool {
        (a - b).length() < 1e-5
    }

    #[test]
    fn test_parse_sphere_defaults() {
        let scene = parse(&scene_with(
            r#"{ "type": "sphere", "position": [1, 2, 3], "color": [1, 0, 0], "radius": 0.5 }"#,
        ))
        .unwrap();

        assert_eq!(scene.objects.len(), 1);
        let sphere = &scene.objects[0];
        assert_eq!(sphere.id, 0);
        assert_eq!(sphere.kind(), ObjectKind::Sphere);
        assert_eq!(sphere.position, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(sphere.direction, Vec3::Y);
        assert_eq!(sphere.shape, Shape::Sphere { radius: 0.5 });
        assert_eq!(sphere.surface.emission, Vec3::ZERO);
        assert_eq!(sphere.surface.reflection, 0.0);
        assert_eq!(sphere.surface.texture, 0);
        assert_eq!(sphere.surface.normal, 0);
        assert_eq!(sphere.surface.shift, Vec2::ZERO);
        assert_eq!(sphere.surface.rotation, Vec2::ZERO);
        assert_eq!(sphere.surface.prolapse, DEFAULT_PROLAPSE);
        assert_eq!(sphere.basis, Basis::IDENTITY);
    }

    #[test]
    fn test_ids_follow_primitive_document_order() {
        let scene = parse(&scene_with(
            r#"
            { "type": "composed", "position": [0, 0, 0], "objects": [
                { "type": "sphere", "position": [0, 0, 0], "color": [1, 1, 1], "radius": 1 },
                { "type": "composed", "objects": [
                    { "type": "plane", "position": [0, 0, 0], "dir": [0, 1, 0], "color": [1, 1, 1] }
                ]}
            ]},
            { "type": "sphere", "position": [0, 0, 0], "color": [1, 1, 1], "radius": 2 }
            "#,
        ))
        .unwrap();

        let ids: Vec<u32> = scene.objects.iter().map(|o| o.id).collect();
        assert_eq!(ids, vec![0, 1, 2]);
        assert_eq!(scene.objects[0].kind(), ObjectKind::Sphere);
        assert_eq!(scene.objects[1].kind(), ObjectKind::Plane);
        assert_eq!(scene.objects[2].shape, Shape::Sphere { radius: 2.0 });
    }

    #[test]
    fn test_composed_offsets_are_additive() {
        let scene = parse(&scene_with(
            r#"
            { "type": "composed", "position": [10, 0, 0], "objects": [
                { "type": "sphere", "position": [1, 2, 3], "color": [1, 1, 1], "radius": 1 },
                { "type": "composed", "position": [0, 5, 0], "objects": [
                    { "type": "sphere", "position": [1, 1, 1], "color": [1, 1, 1], "radius": 1 }
                ]}
            ]}
            "#,
        ))
        .unwrap();

        assert_eq!(scene.objects[0].position, Vec3::new(11.0, 2.0, 3.0));
        assert_eq!(scene.objects[1].position, Vec3::new(11.0, 6.0, 1.0));
    }

    #[test]
    fn test_composed_direction_is_summed_then_normalized() {
        let scene = parse(&scene_with(
            r#"
            { "type": "composed", "dir": [1, 0, 0], "objects": [
                { "type": "cylinder", "position": [0, 0, 0], "dir": [0, 1, 0],
                  "color": [1, 1, 1], "radius": 1 }
            ]}
            "#,
        ))
        .unwrap();

        let expected = Vec3::new(1.0, 1.0, 0.0).normalize();
        assert!(close(scene.objects[0].direction, expected));
    }

    #[test]
    fn test_composed_node_is_never_emitted() {
        let scene = parse(&scene_with(r#"{ "type": "composed", "objects": [] }"#)).unwrap();
        assert!(scene.objects.is_empty());
    }

    #[test]
    fn test_default_basis_degenerate_direction() {
        let scene = parse(&scene_with(
            r#"{ "type": "plane", "position": [0, 0, 0], "dir": [0, 0, 1], "color": [1, 1, 1] }"#,
        ))
        .unwrap();

        let basis = scene.objects[0].basis;
        assert_eq!(basis.x, Vec3::Y);
        assert!(basis.is_orthonormal(1e-5));
    }

    #[test]
    fn test_default_basis_general_direction() {
        let scene = parse(&scene_with(
            r#"{ "type": "cone", "position": [0, 0, 0], "dir": [1, 2, 2],
                 "color": [1, 1, 1], "radius": 1 }"#,
        ))
        .unwrap();

        let object = &scene.objects[0];
        let d = object.direction;
        assert!(close(object.basis.x, Vec3::new(d.y, -d.x, 0.0).normalize()));
        assert!(close(object.basis.z, d));
        assert!(object.basis.is_orthonormal(1e-5));
    }

    #[test]
    fn test_cone_and_cylinder_bases_differ_in_y() {
        let scene = parse(&scene_with(
            r#"{ "type": "cone", "position": [0, 0, 0], "dir": [1, 0, 0], "color": [1, 1, 1], "radius": 1 },
               { "type": "cylinder", "position": [0, 0, 0], "dir": [1, 0, 0], "color": [1, 1, 1], "radius": 1 }"#,
        ))
        .unwrap();

        let cone = scene.objects[0].basis;
        let cylinder = scene.objects[1].basis;
        assert!(close(cone.x, Vec3::NEG_Y));
        assert!(close(cone.y, Vec3::X.cross(Vec3::NEG_Y)));
        assert!(close(cone.z, Vec3::X));
        assert!(close(cylinder.y, -cone.y));
        assert!(close(cylinder.z, Vec3::X));
        assert!(cone.is_orthonormal(1e-5));
    }

    #[test]
    fn test_explicit_basis_is_used() {
        let scene = parse(&scene_with(
            r#"{ "type": "sphere", "position": [0, 0, 0], "color": [1, 1, 1], "radius": 1,
                 "x_basis": [0, 0, 1], "y_basis": [0, 1, 0] }"#,
        ))
        .unwrap();

        let basis = scene.objects[0].basis;
        assert_eq!(basis.x, Vec3::Z);
        assert_eq!(basis.y, Vec3::Y);
        assert!(close(basis.z, Vec3::Z.cross(Vec3::Y)));
    }

    #[test]
    fn test_malformed_basis_is_fatal() {
        let err = parse(&scene_with(
            r#"{ "type": "sphere", "position": [0, 0, 0], "color": [1, 1, 1], "radius": 1,
                 "x_basis": [0, "x", 1] }"#,
        ))
        .unwrap_err();

        assert!(matches!(err, SceneError::MalformedVector { field: "x_basis", .. }));
    }

    #[test]
    fn test_triangle_orientation() {
        let scene = parse(&scene_with(
            r#"{ "type": "triangle", "a": [0, 0, 0], "b": [1, 0, 0], "c": [0, 1, 0],
                 "color": [1, 1, 1] }"#,
        ))
        .unwrap();

        let triangle = &scene.objects[0];
        assert_eq!(triangle.kind(), ObjectKind::Triangle);
        assert!(close(triangle.direction, Vec3::Z));
        assert!(close(triangle.position, Vec3::new(1.0 / 3.0, 1.0 / 3.0, 0.0)));
    }

    #[test]
    fn test_triangle_normal_follows_vertex_order() {
        let v0 = Vec3::new(1.0, 2.0, 3.0);
        let v1 = Vec3::new(4.0, -1.0, 0.5);
        let v2 = Vec3::new(-2.0, 0.0, 1.0);
        let expected = (v1 - v0).cross(v2 - v0).normalize();
        assert!(close(triangle_normal(&[v0, v1, v2]), expected));
        assert!(close(triangle_normal(&[v0, v2, v1]), -expected));
    }

    #[test]
    fn test_triangle_vertices_follow_composition() {
        let scene = parse(&scene_with(
            r#"{ "type": "composed", "position": [0, 0, 2], "objects": [
                 { "type": "triangle", "a": [0, 0, 0], "b": [1, 0, 0], "c": [0, 1, 0],
                   "color": [1, 1, 1] } ]}"#,
        ))
        .unwrap();

        match scene.objects[0].shape {
            Shape::Triangle { vertices } => assert_eq!(vertices[0], Vec3::new(0.0, 0.0, 2.0)),
            ref other => panic!("expected triangle, got {:?}", other),
        }
    }

    #[test]
    fn test_triangle_missing_vertex() {
        let err = parse(&scene_with(
            r#"{ "type": "triangle", "a": [0, 0, 0], "b": [1, 0, 0], "color": [1, 1, 1] }"#,
        ))
        .unwrap_err();
        assert!(matches!(err, SceneError::MissingRequiredField { field: "c", .. }));
    }

    #[test]
    fn test_missing_sphere_radius_is_fatal() {
        let err = parse(&scene_with(
            r#"{ "type": "sphere", "position": [0, 0, 0], "color": [1, 1, 1] }"#,
        ))
        .unwrap_err();

        match err {
            SceneError::MissingRequiredField { field, object } => {
                assert_eq!(field, "radius");
                assert_eq!(object, "sphere");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_missing_direction_for_cylinder() {
        let err = parse(&scene_with(
            r#"{ "type": "cylinder", "position": [0, 0, 0], "color": [1, 1, 1], "radius": 1 }"#,
        ))
        .unwrap_err();
        assert!(matches!(err, SceneError::MissingRequiredField { field: "dir", .. }));
    }

    #[test]
    fn test_plane_needs_no_radius() {
        let scene = parse(&scene_with(
            r#"{ "type": "plane", "position": [0, -1, 0], "dir": [0, 2, 0], "color": [1, 1, 1] }"#,
        ))
        .unwrap();
        assert_eq!(scene.objects[0].shape, Shape::Plane { distance: -1.0 });
    }

    #[test]
    fn test_unknown_type() {
        let err = parse(&scene_with(
            r#"{ "type": "torus", "position": [0, 0, 0], "color": [1, 1, 1] }"#,
        ))
        .unwrap_err();
        assert!(matches!(err, SceneError::UnknownObjectType(ref t) if t == "torus"));
    }

    #[test]
    fn test_malformed_color() {
        let err = parse(&scene_with(
            r#"{ "type": "sphere", "position": [0, 0, 0], "color": [1, 1], "radius": 1 }"#,
        ))
        .unwrap_err();
        assert!(matches!(err, SceneError::MalformedVector { field: "color", .. }));
    }

    #[test]
    fn test_unresolved_texture_defaults_to_zero() {
        let scene = parse(&scene_with(
            r#"{ "type": "sphere", "position": [0, 0, 0], "color": [1, 1, 1], "radius": 1,
                 "texture": "nowhere.png", "normal": "nothing.png" }"#,
        ))
        .unwrap();

        assert_eq!(scene.objects[0].surface.texture, 0);
        assert_eq!(scene.objects[0].surface.normal, 0);
    }

    #[test]
    fn test_numeric_texture_slots() {
        for slot in ["-1", "0", "7", "0.5"] {
            let scene = parse(&scene_with(&format!(
                r#"{{ "type": "sphere", "position": [0, 0, 0], "color": [1, 1, 1], "radius": 1,
                     "texture": {}, "normal": {} }}"#,
                slot, slot
            )))
            .unwrap();
            assert_eq!(scene.objects[0].surface.texture, 0, "texture {}", slot);
            assert_eq!(scene.objects[0].surface.normal, 0, "normal {}", slot);
        }

        let err = parse(&scene_with(
            r#"{ "type": "sphere", "position": [0, 0, 0], "color": [1, 1, 1], "radius": 1,
                 "texture": true }"#,
        ))
        .unwrap_err();
        assert!(matches!(err, SceneError::MalformedField { field: "texture", .. }));
    }

    #[test]
    fn test_declared_references_resolve() {
        let (textures, texture_calls) = CountingDecoder::new();
        let (normals, _) = CountingDecoder::new();
        let mut textures = ResourceRegistry::textures(Box::new(textures));
        let mut normals = ResourceRegistry::normals(Box::new(normals));

        let json = format!(
            r#"{{ "textures": ["wood.png", "stone.png", "wood.png"], "normals": ["bump.png"],
                 "objects": [
                   {{ "type": "sphere", "position": [0, 0, 0], "color": [1, 1, 1], "radius": 1,
                      "texture": "stone.png", "normal": "bump.png" }},
                   {{ "type": "sphere", "position": [0, 0, 0], "color": [1, 1, 1], "radius": 1,
                      "normal": 1, "texture": 1 }}
                 ], {} }}"#,
            CAMERA
        );
        let scene = SceneParser::new(&mut textures, &mut normals, (64, 64))
            .parse_str(&json)
            .unwrap();

        assert_eq!(scene.objects[0].surface.texture, 2);
        assert_eq!(scene.objects[0].surface.normal, 1);
        assert_eq!(scene.objects[1].surface.normal, 1);
        assert_eq!(scene.objects[1].surface.texture, 1);
        assert_eq!(texture_calls.borrow().len(), 2);
        assert_eq!(scene.texture_names.len(), 3);
        assert_eq!(textures.len(), 3);
    }

    #[test]
    fn test_optional_fields() {
        let scene = parse(&scene_with(
            r#"{ "type": "sphere", "position": [0, 0, 0], "color": [1, 1, 1], "radius": 1,
                 "emition": [4, 4, 4], "reflection": 0.25, "shift": [0.5, 0.1],
                 "rotation": [1, 0], "prolapse": [3, 4] }"#,
        ))
        .unwrap();

        let surface = &scene.objects[0].surface;
        assert_eq!(surface.emission, Vec3::splat(4.0));
        assert!(surface.is_emissive());
        assert_eq!(surface.reflection, 0.25);
        assert_eq!(surface.shift, Vec2::new(0.5, 0.1));
        assert_eq!(surface.rotation, Vec2::new(1.0, 0.0));
        assert_eq!(surface.prolapse, Vec2::new(3.0, 4.0));
    }

    #[test]
    fn test_camera_defaults_and_reconfigure() {
        let scene = parse(&scene_with("")).unwrap();

        assert_eq!(scene.cameras.len(), 1);
        let camera = &scene.cameras[0];
        assert_eq!(camera.position, Vec3::new(0.0, 0.0, 5.0));
        assert_eq!(camera.direction, Vec3::NEG_Z);
        assert!(close(camera.up, Vec3::Y));
        assert_eq!(camera.resolution, (800, 600));
        assert!((camera.aspect - 800.0 / 600.0).abs() < 1e-6);
    }

    #[test]
    fn test_camera_requires_direction() {
        let err = parse(r#"{ "cameras": [{ "position": [0, 0, 0] }] }"#).unwrap_err();
        match err {
            SceneError::MissingRequiredField { field, object } => {
                assert_eq!(field, "dir");
                assert_eq!(object, "camera");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_scene_without_cameras() {
        let err = parse(r#"{ "objects": [] }"#).unwrap_err();
        assert!(matches!(err, SceneError::NoCameras));
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(parse("{ objects: "), Err(SceneError::Json(_))));
    }
}
