//! Configuration for the GPU backend and the render loop.

/// WGSL source of the built-in progressive path tracing kernel.
pub const DEFAULT_KERNEL: &str = include_str!("kernels/render_kernel.wgsl");

/// Settings used when creating the GPU resource manager.
#[derive(Clone, Debug)]
pub struct DeviceConfig {
    pub power_preference: wgpu::PowerPreference,

    /// Render target size in pixels
    pub frame_size: (u32, u32),

    /// WGSL kernel source; must declare every kernel argument slot
    pub kernel_source: String,

    /// Seed for the per-pixel random state (`None` = from entropy)
    pub seed: Option<u64>,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            power_preference: wgpu::PowerPreference::HighPerformance,
            frame_size: (1280, 720),
            kernel_source: DEFAULT_KERNEL.to_string(),
            seed: None,
        }
    }
}

/// When the loop invokes the kernel.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum RedrawPolicy {
    /// Keep accumulating every frame until the target is reached.
    #[default]
    Continuous,

    /// Render only after input changed something.
    OnDemand,
}

/// Progressive render loop settings.
#[derive(Clone, Debug)]
pub struct LoopConfig {
    /// Accumulated-sample increment per kernel invocation
    pub samples_per_frame: u32,

    /// Static target; the loop enters `Finished` once reached
    pub target_samples: Option<u32>,

    pub redraw: RedrawPolicy,

    /// Camera translation speed in world units per second
    pub move_speed: f32,

    /// Camera rotation speed in radians per second
    pub turn_speed: f32,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            samples_per_frame: 1,
            target_samples: None,
            redraw: RedrawPolicy::Continuous,
            move_speed: 2.0,
            turn_speed: 1.0,
        }
    }
}
