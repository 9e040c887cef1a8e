//! GPU resource manager.
//!
//! Owns the compute device, the kernel, and every device-side buffer.
//! Buffers are allocated when a scene is loaded and bound to the kernel's
//! argument slots once; a reload tears everything down and starts over.

use lumen_core::{LoadedScene, ResourceRegistry, Scene};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::DeviceConfig;
use crate::error::{GpuError, GpuResult};
use crate::kernel::{dispatch_size, Kernel, KernelSlot};
use crate::layout::{pack_images, pack_objects, GpuCamera, ScalarUniform};
use crate::render_loop::{FrameArguments, RenderBackend};

/// Device-side buffers that can be uploaded to or read back.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum BufferKind {
    Objects,
    Textures,
    Normals,
    Output,
    Scratch,
    RandomState,
}

/// Every buffer of one loaded scene.
struct SceneBuffers {
    objects: wgpu::Buffer,
    textures: wgpu::Buffer,
    normals: wgpu::Buffer,
    output: wgpu::Buffer,
    scratch: wgpu::Buffer,
    rng_state: wgpu::Buffer,
    object_count: wgpu::Buffer,
    sample_count: wgpu::Buffer,
    camera: wgpu::Buffer,
    input_flags: wgpu::Buffer,

    /// Mappable copy target for output readback
    staging: wgpu::Buffer,

    object_total: u32,
}

impl SceneBuffers {
    fn get(&self, kind: BufferKind) -> &wgpu::Buffer {
        match kind {
            BufferKind::Objects => &self.objects,
            BufferKind::Textures => &self.textures,
            BufferKind::Normals => &self.normals,
            BufferKind::Output => &self.output,
            BufferKind::Scratch => &self.scratch,
            BufferKind::RandomState => &self.rng_state,
        }
    }

    fn slot(&self, slot: KernelSlot) -> &wgpu::Buffer {
        match slot {
            KernelSlot::Output => &self.output,
            KernelSlot::Objects => &self.objects,
            KernelSlot::Scratch => &self.scratch,
            KernelSlot::RandomState => &self.rng_state,
            KernelSlot::Textures => &self.textures,
            KernelSlot::ObjectCount => &self.object_count,
            KernelSlot::SampleCount => &self.sample_count,
            KernelSlot::Camera => &self.camera,
            KernelSlot::InputFlags => &self.input_flags,
        }
    }

    fn total_bytes(&self) -> u64 {
        [
            &self.objects,
            &self.textures,
            &self.normals,
            &self.output,
            &self.scratch,
            &self.rng_state,
            &self.staging,
        ]
        .iter()
        .map(|b| b.size())
        .sum()
    }
}

/// Owner of the compute device and all scene buffers.
pub struct GpuResourceManager {
    device: wgpu::Device,
    queue: wgpu::Queue,
    adapter_info: wgpu::AdapterInfo,
    kernel: Kernel,
    frame_size: (u32, u32),
    rng: StdRng,
    buffers: Option<SceneBuffers>,
    bind_group: Option<wgpu::BindGroup>,
}

impl GpuResourceManager {
    /// Create the device and build the kernel.
    pub fn initialize(config: &DeviceConfig) -> GpuResult<Self> {
        pollster::block_on(Self::new(config))
    }

    async fn new(config: &DeviceConfig) -> GpuResult<Self> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: config.power_preference,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok_or_else(|| GpuError::Device("no compute-capable adapter found".to_string()))?;

        let adapter_info = adapter.get_info();
        let adapter_limits = adapter.limits();
        log::info!(
            "Using GPU adapter: {} ({:?})",
            adapter_info.name,
            adapter_info.backend
        );

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Lumen Compute Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits {
                        max_storage_buffer_binding_size: adapter_limits
                            .max_storage_buffer_binding_size,
                        max_buffer_size: adapter_limits.max_buffer_size,
                        ..wgpu::Limits::default()
                    },
                    memory_hints: Default::default(),
                },
                None,
            )
            .await?;

        let kernel = Kernel::build(&device, &config.kernel_source)?;

        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let (width, height) = config.frame_size;
        Ok(Self {
            device,
            queue,
            adapter_info,
            kernel,
            frame_size: (width.max(1), height.max(1)),
            rng,
            buffers: None,
            bind_group: None,
        })
    }

    pub fn adapter_info(&self) -> &wgpu::AdapterInfo {
        &self.adapter_info
    }

    pub fn frame_size(&self) -> (u32, u32) {
        self.frame_size
    }

    /// Number of pixels, which is also the kernel work size.
    pub fn pixel_count(&self) -> u32 {
        self.frame_size.0 * self.frame_size.1
    }

    pub fn is_loaded(&self) -> bool {
        self.buffers.is_some()
    }

    /// Object count argument of the loaded scene.
    pub fn object_count(&self) -> u32 {
        self.buffers.as_ref().map_or(0, |b| b.object_total)
    }

    /// Allocate and fill every buffer for a scene and bind the arguments.
    ///
    /// Any previously loaded scene is released first.
    pub fn load_scene(
        &mut self,
        scene: &Scene,
        textures: &ResourceRegistry,
        normals: &ResourceRegistry,
    ) -> GpuResult<()> {
        self.release();

        let objects = pack_objects(&scene.objects);
        let texture_words = pack_images(textures.images());
        let normal_words = pack_images(normals.images());
        let object_total = scene.objects.len() as u32;

        self.buffers = Some(self.allocate(
            std::mem::size_of_val(objects.as_slice()) as u64,
            std::mem::size_of_val(texture_words.as_slice()) as u64,
            std::mem::size_of_val(normal_words.as_slice()) as u64,
            object_total,
        )?);

        self.upload(BufferKind::Objects, bytemuck::cast_slice(&objects))?;
        self.upload(BufferKind::Textures, bytemuck::cast_slice(&texture_words))?;
        self.upload(BufferKind::Normals, bytemuck::cast_slice(&normal_words))?;
        self.seed_random_state()?;

        if let Some(buffers) = &self.buffers {
            self.queue.write_buffer(
                &buffers.object_count,
                0,
                bytemuck::bytes_of(&ScalarUniform::new(object_total)),
            );
        }

        self.bind_arguments()?;

        if let Some(buffers) = &self.buffers {
            log::info!(
                "Uploaded {} objects, {} textures, {} normal maps ({:.1} MB on device)",
                object_total,
                textures.len(),
                normals.len(),
                buffers.total_bytes() as f64 / (1024.0 * 1024.0)
            );
        }
        Ok(())
    }

    fn allocate(
        &self,
        object_bytes: u64,
        texture_bytes: u64,
        normal_bytes: u64,
        object_total: u32,
    ) -> GpuResult<SceneBuffers> {
        let pixels = self.pixel_count() as u64;

        let max_buffer_size = self.device.limits().max_buffer_size;
        let requested = [
            ("Object", object_bytes),
            ("Texture", texture_bytes),
            ("Normal", normal_bytes),
            ("Scratch", pixels * 16),
        ];
        for (name, size) in requested {
            if size > max_buffer_size {
                return Err(GpuError::Transfer(format!(
                    "{} buffer of {} bytes exceeds the device limit of {} bytes",
                    name, size, max_buffer_size
                )));
            }
        }

        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let storage = |label: &str, size: u64, extra: wgpu::BufferUsages| {
            self.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(label),
                size,
                usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST | extra,
                mapped_at_creation: false,
            })
        };
        let uniform = |label: &str, size: u64| {
            self.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(label),
                size,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            })
        };

        let scalar = std::mem::size_of::<ScalarUniform>() as u64;
        let buffers = SceneBuffers {
            objects: storage("Object Buffer", object_bytes, wgpu::BufferUsages::COPY_SRC),
            textures: storage("Texture Buffer", texture_bytes, wgpu::BufferUsages::COPY_SRC),
            normals: storage("Normal Buffer", normal_bytes, wgpu::BufferUsages::COPY_SRC),
            output: storage("Output Buffer", pixels * 4, wgpu::BufferUsages::COPY_SRC),
            scratch: storage("Scratch Buffer", pixels * 16, wgpu::BufferUsages::COPY_SRC),
            rng_state: storage("Random State Buffer", pixels * 8, wgpu::BufferUsages::COPY_SRC),
            object_count: uniform("Object Count", scalar),
            sample_count: uniform("Sample Count", scalar),
            camera: uniform("Camera", std::mem::size_of::<GpuCamera>() as u64),
            input_flags: uniform("Input Flags", scalar),
            staging: self.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("Output Staging Buffer"),
                size: pixels * 4,
                usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            }),
            object_total,
        };
        let validation = pollster::block_on(self.device.pop_error_scope());
        let out_of_memory = pollster::block_on(self.device.pop_error_scope());
        if let Some(error) = validation.or(out_of_memory) {
            return Err(GpuError::Transfer(format!("Buffer allocation failed: {}", error)));
        }

        log::debug!(
            "Allocated scene buffers for {}x{}: objects {} B, textures {} B, normals {} B",
            self.frame_size.0,
            self.frame_size.1,
            object_bytes,
            texture_bytes,
            normal_bytes
        );
        Ok(buffers)
    }

    fn seed_random_state(&mut self) -> GpuResult<()> {
        let pixels = self.pixel_count() as usize;
        // xoroshiro state must never be all zero
        let state: Vec<[u32; 2]> = (0..pixels)
            .map(|_| [self.rng.gen::<u32>() | 1, self.rng.gen::<u32>()])
            .collect();
        self.upload(BufferKind::RandomState, bytemuck::cast_slice(&state))
    }

    /// Write `data` to the start of a device buffer.
    pub fn upload(&self, kind: BufferKind, data: &[u8]) -> GpuResult<()> {
        let buffers = self.loaded()?;
        let buffer = buffers.get(kind);

        if data.len() as u64 % wgpu::COPY_BUFFER_ALIGNMENT != 0 {
            return Err(GpuError::Transfer(format!(
                "{:?} upload of {} bytes is not 4-byte aligned",
                kind,
                data.len()
            )));
        }
        if data.len() as u64 > buffer.size() {
            return Err(GpuError::Transfer(format!(
                "{:?} upload of {} bytes exceeds buffer size {}",
                kind,
                data.len(),
                buffer.size()
            )));
        }

        self.queue.write_buffer(buffer, 0, data);
        Ok(())
    }

    /// Bind every buffer to its kernel argument slot.
    pub fn bind_arguments(&mut self) -> GpuResult<()> {
        let buffers = self.loaded()?;

        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let entries: Vec<wgpu::BindGroupEntry> = KernelSlot::ALL
            .iter()
            .map(|&slot| wgpu::BindGroupEntry {
                binding: slot.binding(),
                resource: buffers.slot(slot).as_entire_binding(),
            })
            .collect();
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Kernel Arguments"),
            layout: &self.kernel.layout,
            entries: &entries,
        });
        if let Some(error) = pollster::block_on(self.device.pop_error_scope()) {
            return Err(GpuError::Bind(error.to_string()));
        }

        self.bind_group = Some(bind_group);
        Ok(())
    }

    /// Update the per-frame scalar and struct arguments.
    pub fn write_frame_arguments(&self, args: &FrameArguments) -> GpuResult<()> {
        let buffers = self.loaded()?;
        self.queue.write_buffer(
            &buffers.object_count,
            0,
            bytemuck::bytes_of(&ScalarUniform::new(args.object_count)),
        );
        self.queue.write_buffer(
            &buffers.sample_count,
            0,
            bytemuck::bytes_of(&ScalarUniform::new(args.sample_count)),
        );
        self.queue
            .write_buffer(&buffers.camera, 0, bytemuck::bytes_of(&args.camera));
        self.queue.write_buffer(
            &buffers.input_flags,
            0,
            bytemuck::bytes_of(&ScalarUniform::new(args.input_flags)),
        );
        Ok(())
    }

    /// Dispatch the kernel over `work_size` items and wait for completion.
    pub fn invoke(&self, work_size: u32) -> GpuResult<()> {
        let bind_group = self
            .bind_group
            .as_ref()
            .ok_or_else(|| GpuError::Execution("kernel arguments are not bound".to_string()))?;

        self.device.push_error_scope(wgpu::ErrorFilter::Validation);

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Kernel Encoder"),
            });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Kernel Pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.kernel.pipeline);
            pass.set_bind_group(0, bind_group, &[]);
            let (x, y) = dispatch_size(work_size);
            pass.dispatch_workgroups(x, y, 1);
        }
        self.queue.submit(std::iter::once(encoder.finish()));
        self.device.poll(wgpu::Maintain::Wait);

        if let Some(error) = pollster::block_on(self.device.pop_error_scope()) {
            return Err(GpuError::Execution(error.to_string()));
        }
        Ok(())
    }

    /// Copy a device buffer back to the host as 32-bit words.
    pub fn readback(&self, kind: BufferKind) -> GpuResult<Vec<u32>> {
        let buffers = self.loaded()?;
        let source = buffers.get(kind);
        let size = source.size();

        let temporary;
        let staging = if kind == BufferKind::Output {
            &buffers.staging
        } else {
            temporary = self.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("Readback Staging Buffer"),
                size,
                usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });
            &temporary
        };

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Readback Encoder"),
            });
        encoder.copy_buffer_to_buffer(source, 0, staging, 0, size);
        self.queue.submit(std::iter::once(encoder.finish()));

        let slice = staging.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        self.device.poll(wgpu::Maintain::Wait);

        rx.recv()
            .map_err(|_| GpuError::Transfer("map_async channel closed".to_string()))?
            .map_err(|e| GpuError::Transfer(format!("{:?} map failed: {}", kind, e)))?;

        let words = {
            let data = slice.get_mapped_range();
            data.chunks_exact(4)
                .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                .collect()
        };
        staging.unmap();
        Ok(words)
    }

    /// Zero the per-pixel running averages so the next frame starts fresh.
    ///
    /// The random state is left alone.
    pub fn clear_accumulation(&self) -> GpuResult<()> {
        let buffers = self.loaded()?;
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Clear Accumulation"),
            });
        encoder.clear_buffer(&buffers.scratch, 0, None);
        self.queue.submit(std::iter::once(encoder.finish()));
        self.device.poll(wgpu::Maintain::Wait);
        Ok(())
    }

    /// Drop every scene buffer and the argument bindings.
    pub fn release(&mut self) {
        self.bind_group = None;
        if let Some(buffers) = self.buffers.take() {
            log::info!(
                "Released {:.1} MB of GPU buffers",
                buffers.total_bytes() as f64 / (1024.0 * 1024.0)
            );
            for slot in KernelSlot::ALL {
                buffers.slot(slot).destroy();
            }
            buffers.normals.destroy();
            buffers.staging.destroy();
        }
    }

    fn loaded(&self) -> GpuResult<&SceneBuffers> {
        self.buffers
            .as_ref()
            .ok_or_else(|| GpuError::Transfer("no scene is loaded".to_string()))
    }
}

impl Drop for GpuResourceManager {
    fn drop(&mut self) {
        self.release();
    }
}

impl RenderBackend for GpuResourceManager {
    fn frame_size(&self) -> (u32, u32) {
        self.frame_size
    }

    fn object_count(&self) -> u32 {
        GpuResourceManager::object_count(self)
    }

    fn load(&mut self, scene: &LoadedScene) -> GpuResult<()> {
        self.load_scene(&scene.scene, &scene.textures, &scene.normals)
    }

    fn reset_accumulation(&mut self) -> GpuResult<()> {
        self.clear_accumulation()
    }

    fn render(&mut self, args: &FrameArguments) -> GpuResult<()> {
        self.write_frame_arguments(args)?;
        self.invoke(self.pixel_count())
    }

    fn read_output(&mut self) -> GpuResult<Vec<u32>> {
        self.readback(BufferKind::Output)
    }

    fn release(&mut self) {
        GpuResourceManager::release(self);
    }
}
