//! Lumen Core - Scene description and resources for the Lumen path tracer.
//!
//! This crate provides:
//!
//! - **Scene types**: `Scene`, `SceneObject`, `Camera`
//! - **Scene parsing**: JSON scene documents with nested composed objects
//! - **Resources**: deduplicating texture and normal-map registries
//!
//! # Example
//!
//! ```ignore
//! use lumen_core::{load_scene, LoadOptions};
//!
//! let loaded = load_scene("scenes/demo.json", &LoadOptions::default())?;
//! println!("Loaded {} objects, {} cameras",
//!     loaded.scene.object_count(),
//!     loaded.scene.cameras.len());
//! ```

pub mod camera;
pub mod error;
pub mod object;
pub mod parser;
pub mod registry;
pub mod scene;

// Re-export commonly used types
pub use camera::{Camera, CAMERA_FOV, EFFECT_COUNT};
pub use error::{ResourceError, ResourceResult, SceneError, SceneResult};
pub use object::{ObjectKind, SceneObject, Shape, Surface};
pub use parser::SceneParser;
pub use registry::{pack_argb, FileDecoder, Image, ImageDecoder, ResourceRegistry};
pub use scene::{load_scene, LoadOptions, LoadedScene, Scene};
