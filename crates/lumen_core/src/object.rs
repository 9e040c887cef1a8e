//! Render object types.
//!
//! These are the primitive objects left after flattening. Composed
//! grouping nodes never reach this representation.

use std::fmt;

use lumen_math::{Basis, Vec2, Vec3};

/// Extent used when an object declares no `prolapse`.
pub const DEFAULT_PROLAPSE: Vec2 = Vec2::new(1000.0, 1000.0);

/// Primitive object kinds understood by the kernel.
///
/// The discriminants are the type tags written into the GPU record.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ObjectKind {
    Sphere = 0,
    Cylinder = 1,
    Cone = 2,
    Plane = 3,
    Triangle = 4,
}

impl ObjectKind {
    /// Parse a scene-file type tag. `composed` is not a primitive kind.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "sphere" => Some(Self::Sphere),
            "cylinder" => Some(Self::Cylinder),
            "cone" => Some(Self::Cone),
            "plane" => Some(Self::Plane),
            "triangle" => Some(Self::Triangle),
            _ => None,
        }
    }

    /// Scene-file tag for this kind.
    pub fn tag(self) -> &'static str {
        match self {
            Self::Sphere => "sphere",
            Self::Cylinder => "cylinder",
            Self::Cone => "cone",
            Self::Plane => "plane",
            Self::Triangle => "triangle",
        }
    }

    /// Whether the scene file must supply `dir` for this kind.
    pub fn requires_direction(self) -> bool {
        !matches!(self, Self::Sphere | Self::Triangle)
    }

    /// Whether the scene file must supply `radius` for this kind.
    pub fn requires_radius(self) -> bool {
        !matches!(self, Self::Plane | Self::Triangle)
    }

    /// Whether the scene file must supply `position` for this kind.
    pub fn requires_position(self) -> bool {
        self != Self::Triangle
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Type-specific geometry of a primitive.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Shape {
    Sphere { radius: f32 },
    Cylinder { radius: f32 },
    Cone { radius: f32 },
    Plane { distance: f32 },
    Triangle { vertices: [Vec3; 3] },
}

impl Shape {
    /// The kind tag of this shape.
    pub fn kind(&self) -> ObjectKind {
        match self {
            Self::Sphere { .. } => ObjectKind::Sphere,
            Self::Cylinder { .. } => ObjectKind::Cylinder,
            Self::Cone { .. } => ObjectKind::Cone,
            Self::Plane { .. } => ObjectKind::Plane,
            Self::Triangle { .. } => ObjectKind::Triangle,
        }
    }

    /// Radius for round shapes, zero otherwise.
    pub fn radius(&self) -> f32 {
        match *self {
            Self::Sphere { radius } | Self::Cylinder { radius } | Self::Cone { radius } => radius,
            _ => 0.0,
        }
    }
}

/// Surface appearance of a primitive.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Surface {
    /// Linear RGB color
    pub color: Vec3,

    /// Radiant color, zero for non-emitters
    pub emission: Vec3,

    /// Reflection coefficient in [0, 1]
    pub reflection: f32,

    /// Texture registry index (0 = default texture)
    pub texture: u32,

    /// Normal-map registry index or flag (0 = default)
    pub normal: u32,

    /// Texture offset
    pub shift: Vec2,

    /// Texture rotation
    pub rotation: Vec2,

    /// Bounding extent along the basis
    pub prolapse: Vec2,
}

impl Default for Surface {
    fn default() -> Self {
        Self {
            color: Vec3::ONE,
            emission: Vec3::ZERO,
            reflection: 0.0,
            texture: 0,
            normal: 0,
            shift: Vec2::ZERO,
            rotation: Vec2::ZERO,
            prolapse: DEFAULT_PROLAPSE,
        }
    }
}

impl Surface {
    /// Check if this surface emits light.
    pub fn is_emissive(&self) -> bool {
        self.emission.length_squared() > 0.0
    }
}

/// A fully resolved primitive in world space.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneObject {
    /// Sequential id in document order of primitive declarations
    pub id: u32,

    /// World-space position after composed offsets
    pub position: Vec3,

    /// Normalized orientation direction
    pub direction: Vec3,

    /// Orthonormal basis (supplied or derived)
    pub basis: Basis,

    pub surface: Surface,

    pub shape: Shape,
}

impl SceneObject {
    /// The kind tag of this object.
    pub fn kind(&self) -> ObjectKind {
        self.shape.kind()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_tags_round_trip() {
        for kind in [
            ObjectKind::Sphere,
            ObjectKind::Cylinder,
            ObjectKind::Cone,
            ObjectKind::Plane,
            ObjectKind::Triangle,
        ] {
            assert_eq!(ObjectKind::from_tag(kind.tag()), Some(kind));
        }
        assert_eq!(ObjectKind::from_tag("composed"), None);
        assert_eq!(ObjectKind::from_tag("Sphere"), None);
    }

    #[test]
    fn test_required_fields() {
        assert!(!ObjectKind::Sphere.requires_direction());
        assert!(ObjectKind::Sphere.requires_radius());
        assert!(!ObjectKind::Plane.requires_radius());
        assert!(!ObjectKind::Triangle.requires_position());
        assert!(ObjectKind::Cone.requires_direction());
    }

    #[test]
    fn test_shape_radius() {
        assert_eq!(Shape::Cone { radius: 2.0 }.radius(), 2.0);
        assert_eq!(Shape::Plane { distance: 3.0 }.radius(), 0.0);
        assert_eq!(Shape::Plane { distance: 3.0 }.kind(), ObjectKind::Plane);
    }
}
