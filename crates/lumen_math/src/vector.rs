// Vector utilities for Vec3
//
// Extends glam::Vec3 with the handful of helpers the scene compiler needs
// on top of what glam already provides (normalize, cross, dot).

use glam::Vec3;

/// Extension trait for Vec3 to provide scene-compilation helpers
pub trait Vec3Ext {
    /// Sum two directions and renormalize the result.
    /// Falls back to `fallback` when the sum has no usable length.
    fn sum_normalized(self, other: Vec3, fallback: Vec3) -> Vec3;

    /// Convert to a plain array, the layout GPU records expect.
    fn to_gpu(self) -> [f32; 3];
}

impl Vec3Ext for Vec3 {
    fn sum_normalized(self, other: Vec3, fallback: Vec3) -> Vec3 {
        (self + other).try_normalize().unwrap_or(fallback)
    }

    fn to_gpu(self) -> [f32; 3] {
        self.to_array()
    }
}
