//! Error types for scene loading.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while loading an image resource.
#[derive(Error, Debug)]
pub enum ResourceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to decode '{name}': {source}")]
    Decode {
        name: String,
        #[source]
        source: image::ImageError,
    },
}

/// Result type for resource operations.
pub type ResourceResult<T> = Result<T, ResourceError>;

/// Errors that can occur while compiling a scene description.
///
/// Every variant is fatal for the scene: there is no partial scene.
#[derive(Error, Debug)]
pub enum SceneError {
    #[error("Cannot read scene file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Scene file {0} must have a .json extension")]
    WrongExtension(PathBuf),

    #[error("Invalid scene document: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unknown object type '{0}'")]
    UnknownObjectType(String),

    #[error("Missing data of {object} {field}")]
    MissingRequiredField { field: &'static str, object: String },

    #[error("Malformed {field} vector of {object}")]
    MalformedVector { field: &'static str, object: String },

    #[error("Malformed {field} value of {object}")]
    MalformedField { field: &'static str, object: String },

    #[error("Scene declares no cameras")]
    NoCameras,

    #[error("Resource error: {0}")]
    Resource(#[from] ResourceError),
}

/// Result type for scene operations.
pub type SceneResult<T> = Result<T, SceneError>;
