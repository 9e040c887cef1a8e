//! Kernel argument slots and compute pipeline construction.
//!
//! The kernel takes nine arguments in a fixed order. Each one is a named
//! slot bound at `@group(0) @binding(n)`; the table below is the single
//! source for the bind group layout, the bind group entries and the
//! declaration check run against the kernel source before it is compiled.

use crate::error::{GpuError, GpuResult};

/// Entry point every kernel must export.
pub const KERNEL_ENTRY_POINT: &str = "main";

/// Threads per workgroup declared by the kernel.
pub const WORKGROUP_SIZE: u32 = 64;

/// Upper bound for a single dispatch dimension.
const MAX_DISPATCH_DIMENSION: u32 = 65_535;

/// One kernel argument, in argument order.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum KernelSlot {
    Output,
    Objects,
    Scratch,
    RandomState,
    Textures,
    ObjectCount,
    SampleCount,
    Camera,
    InputFlags,
}

impl KernelSlot {
    /// All slots in argument order.
    pub const ALL: [KernelSlot; 9] = [
        KernelSlot::Output,
        KernelSlot::Objects,
        KernelSlot::Scratch,
        KernelSlot::RandomState,
        KernelSlot::Textures,
        KernelSlot::ObjectCount,
        KernelSlot::SampleCount,
        KernelSlot::Camera,
        KernelSlot::InputFlags,
    ];

    /// Binding index in group 0 (the argument position).
    pub fn binding(self) -> u32 {
        match self {
            Self::Output => 0,
            Self::Objects => 1,
            Self::Scratch => 2,
            Self::RandomState => 3,
            Self::Textures => 4,
            Self::ObjectCount => 5,
            Self::SampleCount => 6,
            Self::Camera => 7,
            Self::InputFlags => 8,
        }
    }

    /// Variable name the kernel declares for this slot.
    pub fn name(self) -> &'static str {
        match self {
            Self::Output => "output",
            Self::Objects => "objects",
            Self::Scratch => "scratch",
            Self::RandomState => "rng_state",
            Self::Textures => "textures",
            Self::ObjectCount => "object_count",
            Self::SampleCount => "sample_count",
            Self::Camera => "camera",
            Self::InputFlags => "input_flags",
        }
    }

    /// Scalar and struct arguments change per frame; buffers do not.
    pub fn is_uniform(self) -> bool {
        matches!(
            self,
            Self::ObjectCount | Self::SampleCount | Self::Camera | Self::InputFlags
        )
    }

    fn buffer_binding_type(self) -> wgpu::BufferBindingType {
        match self {
            Self::Objects | Self::Textures => wgpu::BufferBindingType::Storage { read_only: true },
            Self::Output | Self::Scratch | Self::RandomState => {
                wgpu::BufferBindingType::Storage { read_only: false }
            }
            _ => wgpu::BufferBindingType::Uniform,
        }
    }

    /// Bind group layout entry for this slot.
    pub fn layout_entry(self) -> wgpu::BindGroupLayoutEntry {
        wgpu::BindGroupLayoutEntry {
            binding: self.binding(),
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Buffer {
                ty: self.buffer_binding_type(),
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        }
    }
}

/// `(binding, name)` of every `@binding(n) var... name` declaration.
///
/// Declarations are expected on a single line, as the bundled kernel
/// writes them.
pub fn declared_bindings(source: &str) -> Vec<(u32, String)> {
    const MARKER: &str = "@binding(";

    let mut bindings = Vec::new();
    for line in source.lines() {
        let line = line.trim();
        if line.starts_with("//") {
            continue;
        }
        let Some(start) = line.find(MARKER) else {
            continue;
        };
        let rest = &line[start + MARKER.len()..];
        let Some(close) = rest.find(')') else {
            continue;
        };
        let Ok(binding) = rest[..close].trim().parse::<u32>() else {
            continue;
        };
        let Some(var) = rest.find("var") else {
            continue;
        };

        let mut decl = &rest[var + 3..];
        if let Some(qualified) = decl.strip_prefix('<') {
            match qualified.find('>') {
                Some(end) => decl = &qualified[end + 1..],
                None => continue,
            }
        }
        let name: String = decl
            .trim_start()
            .chars()
            .take_while(|c| c.is_alphanumeric() || *c == '_')
            .collect();
        if !name.is_empty() {
            bindings.push((binding, name));
        }
    }
    bindings
}

/// Check that a kernel declares exactly the argument slots, by name.
pub fn validate_kernel_source(source: &str) -> GpuResult<()> {
    if !source.contains(&format!("fn {}(", KERNEL_ENTRY_POINT)) {
        return Err(GpuError::KernelBuild(format!(
            "kernel has no '{}' entry point",
            KERNEL_ENTRY_POINT
        )));
    }

    let declared = declared_bindings(source);
    for slot in KernelSlot::ALL {
        match declared.iter().find(|(binding, _)| *binding == slot.binding()) {
            Some((_, name)) if name == slot.name() => {}
            Some((_, name)) => {
                return Err(GpuError::KernelBuild(format!(
                    "binding {} is '{}', expected '{}'",
                    slot.binding(),
                    name,
                    slot.name()
                )))
            }
            None => {
                return Err(GpuError::KernelBuild(format!(
                    "kernel does not declare binding {} ('{}')",
                    slot.binding(),
                    slot.name()
                )))
            }
        }
    }

    if let Some((binding, name)) = declared
        .iter()
        .find(|(binding, _)| *binding as usize >= KernelSlot::ALL.len())
    {
        return Err(GpuError::KernelBuild(format!(
            "unexpected binding {} ('{}')",
            binding, name
        )));
    }
    Ok(())
}

/// Workgroup counts covering `work_size` items.
///
/// Large frames are folded into the y dimension; the kernel flattens the
/// workgroup id back with `num_workgroups.x`.
pub fn dispatch_size(work_size: u32) -> (u32, u32) {
    let groups = work_size.div_ceil(WORKGROUP_SIZE).max(1);
    if groups <= MAX_DISPATCH_DIMENSION {
        (groups, 1)
    } else {
        (MAX_DISPATCH_DIMENSION, groups.div_ceil(MAX_DISPATCH_DIMENSION))
    }
}

/// A compiled kernel and the layout its arguments bind against.
pub struct Kernel {
    pub layout: wgpu::BindGroupLayout,
    pub pipeline: wgpu::ComputePipeline,
}

impl Kernel {
    /// Validate and compile a WGSL kernel.
    pub fn build(device: &wgpu::Device, source: &str) -> GpuResult<Self> {
        validate_kernel_source(source)?;

        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Render Kernel"),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });

        let entries: Vec<wgpu::BindGroupLayoutEntry> =
            KernelSlot::ALL.iter().map(|slot| slot.layout_entry()).collect();
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Kernel Argument Layout"),
            entries: &entries,
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Kernel Pipeline Layout"),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("Kernel Pipeline"),
            layout: Some(&pipeline_layout),
            module: &module,
            entry_point: KERNEL_ENTRY_POINT,
            compilation_options: Default::default(),
            cache: None,
        });

        if let Some(error) = pollster::block_on(device.pop_error_scope()) {
            return Err(GpuError::KernelBuild(error.to_string()));
        }

        log::info!("Kernel built with {} argument slots", KernelSlot::ALL.len());
        Ok(Self { layout, pipeline })
    }
}
