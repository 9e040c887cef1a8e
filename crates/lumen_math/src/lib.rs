// Re-export glam for convenience
pub use glam::*;

// Lumen math types
mod basis;
mod vector;
pub use basis::{derived_x_axis, Basis};
pub use vector::Vec3Ext;
