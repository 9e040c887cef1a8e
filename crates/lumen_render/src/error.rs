//! Error types for the GPU backend and the render loop.

use lumen_core::SceneError;
use thiserror::Error;

/// Errors raised by the GPU resource manager.
///
/// All of them are fatal to the renderer: there is no fallback path.
#[derive(Error, Debug)]
pub enum GpuError {
    #[error("No suitable GPU adapter: {0}")]
    Device(String),

    #[error("Failed to create GPU device: {0}")]
    RequestDevice(#[from] wgpu::RequestDeviceError),

    #[error("Kernel build failed: {0}")]
    KernelBuild(String),

    #[error("Argument binding failed: {0}")]
    Bind(String),

    #[error("Transfer failed: {0}")]
    Transfer(String),

    #[error("Kernel execution failed: {0}")]
    Execution(String),
}

/// Result type for GPU operations.
pub type GpuResult<T> = Result<T, GpuError>;

/// Error reported by a presentation layer.
#[derive(Error, Debug)]
#[error("Presentation failed: {0}")]
pub struct PresentError(pub String);

/// Errors that end the progressive render loop.
#[derive(Error, Debug)]
pub enum LoopError {
    #[error(transparent)]
    Gpu(#[from] GpuError),

    #[error("Scene reload failed: {0}")]
    Scene(#[from] SceneError),

    #[error(transparent)]
    Present(#[from] PresentError),
}

/// Result type for render loop operations.
pub type LoopResult<T> = Result<T, LoopError>;
