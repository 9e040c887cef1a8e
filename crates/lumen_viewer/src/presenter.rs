//! Window presentation layer.
//!
//! winit delivers events to the application handler, which forwards them
//! here; `pump_events` drains what has accumulated since the last frame.
//! `present` uploads the ARGB frame into a texture, blits it over the whole
//! surface and draws the egui overlay on top.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use lumen_core::EFFECT_COUNT;
use lumen_render::{FrameInput, FrameStatus, LoopState, PresentError, Presenter, INPUT_FLAG_MODIFIER};
use wgpu::{Device, Instance, Queue, Surface, SurfaceConfiguration};
use winit::event::WindowEvent;
use winit::window::Window;

use crate::input::InputState;
use crate::screenshot::save_screenshot;

/// Overlay names of the kernel's post effects, by selector.
pub const EFFECT_NAMES: [&str; EFFECT_COUNT as usize] = [
    "None",
    "Grayscale",
    "Sepia",
    "Invert",
    "Posterize",
    "Swap R/B",
    "Contrast",
    "Warm",
    "Cool",
];

/// The frame texture and the bind group the blit samples it through.
struct FrameTarget {
    texture: wgpu::Texture,
    bind_group: wgpu::BindGroup,
    size: (u32, u32),
}

/// Presents frames into a winit window.
pub struct WindowPresenter {
    window: Arc<Window>,
    surface: Surface<'static>,
    device: Device,
    queue: Queue,
    config: SurfaceConfiguration,
    size: (u32, u32),

    blit_pipeline: wgpu::RenderPipeline,
    blit_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    frame: FrameTarget,

    // egui state
    egui_ctx: egui::Context,
    egui_state: egui_winit::State,
    egui_renderer: egui_wgpu::Renderer,

    pub input: InputState,
    show_ui: bool,
    screenshot_dir: PathBuf,
}

impl WindowPresenter {
    /// Create a presenter for the given window
    pub async fn new(
        window: Arc<Window>,
        frame_size: (u32, u32),
        show_ui: bool,
        screenshot_dir: PathBuf,
    ) -> Result<Self> {
        let size = window.inner_size();

        let instance = Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });

        let surface = instance.create_surface(window.clone())?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or_else(|| anyhow::anyhow!("Failed to find a GPU adapter for the window"))?;

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Lumen Present Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                    memory_hints: Default::default(),
                },
                None,
            )
            .await?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .unwrap_or(surface_caps.formats[0]);

        let config = SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::Fifo, // VSync
            alpha_mode: surface_caps.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Blit Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/blit.wgsl").into()),
        });

        let blit_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Blit Bind Group Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Blit Pipeline Layout"),
            bind_group_layouts: &[&blit_layout],
            push_constant_ranges: &[],
        });

        let blit_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Blit Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: "vs_main",
                buffers: &[],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: "fs_main",
                targets: &[Some(wgpu::ColorTargetState {
                    format: config.format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Frame Sampler"),
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let frame = Self::create_frame_target(
            &device,
            &blit_layout,
            &sampler,
            Self::frame_format(config.format),
            frame_size,
        );

        // Initialize egui
        let egui_ctx = egui::Context::default();
        let egui_state = egui_winit::State::new(
            egui_ctx.clone(),
            egui::ViewportId::ROOT,
            &window,
            Some(window.scale_factor() as f32),
            None,
            None,
        );
        let egui_renderer = egui_wgpu::Renderer::new(&device, config.format, None, 1, false);

        log::info!(
            "Presenter ready: {:?} surface {}x{}, frame {}x{}",
            config.format,
            config.width,
            config.height,
            frame_size.0,
            frame_size.1
        );

        Ok(Self {
            window,
            surface,
            device,
            queue,
            size: (config.width, config.height),
            config,
            blit_pipeline,
            blit_layout,
            sampler,
            frame,
            egui_ctx,
            egui_state,
            egui_renderer,
            input: InputState::new(),
            show_ui,
            screenshot_dir,
        })
    }

    /// Frame pixels are display-ready; an sRGB view keeps them unchanged on
    /// an sRGB surface.
    fn frame_format(surface_format: wgpu::TextureFormat) -> wgpu::TextureFormat {
        if surface_format.is_srgb() {
            wgpu::TextureFormat::Bgra8UnormSrgb
        } else {
            wgpu::TextureFormat::Bgra8Unorm
        }
    }

    fn create_frame_target(
        device: &Device,
        layout: &wgpu::BindGroupLayout,
        sampler: &wgpu::Sampler,
        format: wgpu::TextureFormat,
        size: (u32, u32),
    ) -> FrameTarget {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Frame Texture"),
            size: wgpu::Extent3d {
                width: size.0.max(1),
                height: size.1.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Frame Bind Group"),
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(sampler),
                },
            ],
        });

        FrameTarget {
            texture,
            bind_group,
            size,
        }
    }

    pub fn request_redraw(&self) {
        self.window.request_redraw();
    }

    /// Handle window resize
    pub fn resize(&mut self, new_size: (u32, u32)) {
        if new_size.0 > 0 && new_size.1 > 0 {
            self.size = new_size;
            self.config.width = new_size.0;
            self.config.height = new_size.1;
            self.surface.configure(&self.device, &self.config);
            self.input.request_redraw();
        }
    }

    /// Handle egui window event - returns true if event was consumed by egui
    pub fn handle_egui_event(&mut self, event: &WindowEvent) -> bool {
        let response = self.egui_state.on_window_event(&self.window, event);
        response.consumed
    }

    fn upload_frame(&mut self, frame: &[u32], size: (u32, u32)) -> Result<(), PresentError> {
        let expected = (size.0 as usize) * (size.1 as usize);
        if frame.len() != expected {
            return Err(PresentError(format!(
                "frame has {} pixels, expected {}x{}",
                frame.len(),
                size.0,
                size.1
            )));
        }

        if self.frame.size != size {
            self.frame = Self::create_frame_target(
                &self.device,
                &self.blit_layout,
                &self.sampler,
                Self::frame_format(self.config.format),
                size,
            );
        }

        // Little-endian ARGB words are BGRA bytes
        self.queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &self.frame.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            bytemuck::cast_slice(frame),
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(4 * size.0),
                rows_per_image: Some(size.1),
            },
            wgpu::Extent3d {
                width: size.0,
                height: size.1,
                depth_or_array_layers: 1,
            },
        );
        Ok(())
    }

    fn draw(&mut self, status: &FrameStatus) -> Result<(), PresentError> {
        let output = match self.surface.get_current_texture() {
            Ok(output) => output,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                // Surface lost, reconfigure
                self.resize(self.size);
                return Ok(());
            }
            Err(wgpu::SurfaceError::OutOfMemory) => {
                return Err(PresentError("surface out of memory".to_string()));
            }
            Err(e) => {
                log::warn!("Surface error: {:?}", e);
                return Ok(());
            }
        };
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        // Build the overlay; edits are fed back as input for the next frame
        let raw_input = self.egui_state.take_egui_input(&self.window);
        let show_ui = self.show_ui;
        let mut effect = status.camera.effect.min(EFFECT_COUNT - 1) as usize;
        let mut brightness = status.camera.brightness;
        let mut screenshot = false;

        let full_output = self.egui_ctx.run(raw_input, |ctx| {
            if show_ui {
                overlay(ctx, status, &mut effect, &mut brightness, &mut screenshot);
            }
        });

        if effect as u32 != status.camera.effect {
            self.input.set_effect(effect as u32);
        }
        if brightness != status.camera.brightness {
            self.input.set_brightness(brightness);
        }
        if screenshot {
            self.input.request_screenshot();
        }

        self.egui_state
            .handle_platform_output(&self.window, full_output.platform_output);

        let screen_descriptor = egui_wgpu::ScreenDescriptor {
            size_in_pixels: [self.size.0, self.size.1],
            pixels_per_point: self.window.scale_factor() as f32,
        };
        let paint_jobs = self
            .egui_ctx
            .tessellate(full_output.shapes, full_output.pixels_per_point);

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Present Encoder"),
            });

        for (id, image_delta) in &full_output.textures_delta.set {
            self.egui_renderer
                .update_texture(&self.device, &self.queue, *id, image_delta);
        }
        self.egui_renderer.update_buffers(
            &self.device,
            &self.queue,
            &mut encoder,
            &paint_jobs,
            &screen_descriptor,
        );

        {
            let mut blit_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Blit Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            blit_pass.set_pipeline(&self.blit_pipeline);
            blit_pass.set_bind_group(0, &self.frame.bind_group, &[]);
            blit_pass.draw(0..3, 0..1);
        }

        {
            let mut egui_pass = encoder
                .begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("egui Render Pass"),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view: &view,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Load,
                            store: wgpu::StoreOp::Store,
                        },
                    })],
                    depth_stencil_attachment: None,
                    timestamp_writes: None,
                    occlusion_query_set: None,
                })
                .forget_lifetime();
            self.egui_renderer
                .render(&mut egui_pass, &paint_jobs, &screen_descriptor);
        }

        for id in &full_output.textures_delta.free {
            self.egui_renderer.free_texture(id);
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();
        Ok(())
    }
}

impl Presenter for WindowPresenter {
    fn pump_events(&mut self, status: &FrameStatus) -> FrameInput {
        self.input.take_frame_input(status.camera.brightness)
    }

    fn present(&mut self, frame: &[u32], status: &FrameStatus) -> Result<(), PresentError> {
        if self.input.take_overlay_toggle() {
            self.show_ui = !self.show_ui;
        }
        self.upload_frame(frame, status.frame_size)?;

        if self.input.take_screenshot_request() {
            match save_screenshot(frame, status.frame_size, &self.screenshot_dir, status.samples) {
                Ok(path) => log::info!("Saved screenshot {}", path.display()),
                Err(e) => log::error!("Screenshot failed: {:#}", e),
            }
        }

        self.draw(status)
    }
}

fn state_label(state: LoopState) -> &'static str {
    match state {
        LoopState::Idle => "Idle",
        LoopState::Accumulating => "Accumulating",
        LoopState::Finished => "Finished",
        LoopState::Quitting => "Quitting",
    }
}

fn overlay(
    ctx: &egui::Context,
    status: &FrameStatus,
    effect: &mut usize,
    brightness: &mut f32,
    screenshot: &mut bool,
) {
    egui::Window::new("Lumen")
        .default_pos([12.0, 12.0])
        .default_width(260.0)
        .resizable(false)
        .show(ctx, |ui| {
            ui.label(format!("FPS: {:.1}", status.fps));
            ui.label(format!("Samples/s: {:.1}", status.samples_per_second));
            match status.target_samples {
                Some(target) => ui.label(format!("Samples: {} / {}", status.samples, target)),
                None => ui.label(format!("Samples: {}", status.samples)),
            };
            ui.label(format!("State: {}", state_label(status.state)));
            ui.separator();

            ui.collapsing("Scene", |ui| {
                ui.label(format!("Objects: {}", status.object_count));
                ui.label(format!("Frame: {}x{}", status.frame_size.0, status.frame_size.1));
                ui.label(format!(
                    "Camera: {} / {}",
                    status.camera_index + 1,
                    status.camera_count
                ));
                let p = status.camera.position;
                ui.label(format!("Position: ({:.2}, {:.2}, {:.2})", p.x, p.y, p.z));
                let d = status.camera.direction;
                ui.label(format!("Direction: ({:.2}, {:.2}, {:.2})", d.x, d.y, d.z));
                let modifier = status.input_flags & INPUT_FLAG_MODIFIER != 0;
                ui.label(format!("Preview shading: {}", if modifier { "on" } else { "off" }));
            });
            ui.separator();

            egui::ComboBox::from_label("Effect")
                .selected_text(EFFECT_NAMES[*effect])
                .show_ui(ui, |ui| {
                    for (index, name) in EFFECT_NAMES.iter().enumerate() {
                        ui.selectable_value(effect, index, *name);
                    }
                });
            ui.add(egui::Slider::new(brightness, 0.0..=4.0).text("Brightness"));
            if ui.button("Screenshot").clicked() {
                *screenshot = true;
            }
            ui.separator();

            ui.collapsing("Controls", |ui| {
                ui.label("W/A/S/D: Move forward/left/back/right");
                ui.label("Q/E: Move down/up");
                ui.label("Arrows: Turn");
                ui.label("Tab: Next camera");
                ui.label("F5: Reload scene");
                ui.label("1-9: Effect, +/-: Brightness");
                ui.label("R: Toggle preview shading");
                ui.label("P: Screenshot, H: Hide overlay, Esc: Quit");
            });
        });
}
