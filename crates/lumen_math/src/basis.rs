use crate::Vec3;

/// An orthonormal basis triple attached to a scene object.
///
/// The kernel uses it for texture-space mapping, so only the axes matter,
/// not the handedness convention of any particular primitive.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Basis {
    pub x: Vec3,
    pub y: Vec3,
    pub z: Vec3,
}

impl Basis {
    /// World axes.
    pub const IDENTITY: Self = Self {
        x: Vec3::X,
        y: Vec3::Y,
        z: Vec3::Z,
    };

    /// Create a basis from three explicit axes.
    pub fn new(x: Vec3, y: Vec3, z: Vec3) -> Self {
        Self { x, y, z }
    }

    /// Check that all three axes are unit length and mutually perpendicular.
    pub fn is_orthonormal(&self, tolerance: f32) -> bool {
        let unit = |v: Vec3| (v.length() - 1.0).abs() <= tolerance;
        unit(self.x)
            && unit(self.y)
            && unit(self.z)
            && self.x.dot(self.y).abs() <= tolerance
            && self.x.dot(self.z).abs() <= tolerance
            && self.y.dot(self.z).abs() <= tolerance
    }
}

impl Default for Basis {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Derive the default x axis of a basis from an orientation direction.
///
/// Returns `normalize(dy, -dx, 0)`. When the direction has no xy component
/// at all the cross product is degenerate, so `(0, 1, 0)` is used instead.
pub fn derived_x_axis(direction: Vec3) -> Vec3 {
    if direction.x == 0.0 && direction.y == 0.0 {
        Vec3::Y
    } else {
        Vec3::new(direction.y, -direction.x, 0.0).normalize()
    }
}
