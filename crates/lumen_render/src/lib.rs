//! Lumen Render - GPU resources and the progressive render loop.
//!
//! - [`GpuResourceManager`] owns the compute device, the compiled kernel and
//!   every buffer a scene needs, and invokes the kernel once per frame.
//! - [`ProgressiveRenderer`] accumulates samples across frames, resets on
//!   camera motion or reload, and hands finished frames to a [`Presenter`].

pub mod config;
pub mod error;
pub mod kernel;
pub mod layout;
pub mod manager;
pub mod render_loop;

pub use config::{DeviceConfig, LoopConfig, RedrawPolicy, DEFAULT_KERNEL};
pub use error::{GpuError, GpuResult, LoopError, LoopResult, PresentError};
pub use kernel::{Kernel, KernelSlot};
pub use layout::{GpuCamera, GpuObject};
pub use manager::{BufferKind, GpuResourceManager};
pub use render_loop::{
    FrameArguments, FrameInput, FrameStats, FrameStatus, LoopState, Presenter,
    ProgressiveRenderer, RenderBackend, SceneFile, SceneSource, INPUT_FLAG_MODIFIER,
};
