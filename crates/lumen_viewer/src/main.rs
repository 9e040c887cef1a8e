//! Interactive viewer for the Lumen progressive path tracer.
//!
//! Usage: `lumen_viewer <scene.json> [--config <file>]`

mod config;
mod input;
mod presenter;
mod screenshot;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use lumen_render::{GpuResourceManager, LoopState, ProgressiveRenderer, SceneFile};
use winit::{
    application::ApplicationHandler,
    event::{ElementState, KeyEvent, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::PhysicalKey,
    window::{Window, WindowId},
};

use crate::config::ViewerConfig;
use crate::presenter::WindowPresenter;

const USAGE: &str = "Usage: lumen_viewer <scene.json> [--config <file>]";

type Renderer = ProgressiveRenderer<GpuResourceManager, SceneFile>;

/// Command line arguments
#[derive(Debug, PartialEq)]
struct Args {
    scene: PathBuf,
    config: Option<PathBuf>,
}

fn parse_args<I: IntoIterator<Item = String>>(args: I) -> Result<Args> {
    let mut scene = None;
    let mut config = None;

    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                let path = args.next().context("--config needs a file")?;
                config = Some(PathBuf::from(path));
            }
            "-h" | "--help" => anyhow::bail!("{}", USAGE),
            flag if flag.starts_with("--") => anyhow::bail!("Unknown option {}\n{}", flag, USAGE),
            _ if scene.is_none() => scene = Some(PathBuf::from(arg)),
            _ => anyhow::bail!("Unexpected argument {}\n{}", arg, USAGE),
        }
    }

    Ok(Args {
        scene: scene.with_context(|| format!("No scene file given\n{}", USAGE))?,
        config,
    })
}

/// Application state
struct App {
    renderer: Renderer,
    presenter: Option<WindowPresenter>,
    config: ViewerConfig,
    title: String,
    last_frame_time: Instant,
    error: Option<anyhow::Error>,
}

impl App {
    fn new(renderer: Renderer, config: ViewerConfig, title: String) -> Self {
        Self {
            renderer,
            presenter: None,
            config,
            title,
            last_frame_time: Instant::now(),
            error: None,
        }
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, error: anyhow::Error) {
        log::error!("{:#}", error);
        self.error = Some(error);
        event_loop.exit();
    }

    /// Run one loop iteration against the window.
    fn advance(&mut self, event_loop: &ActiveEventLoop) {
        let Some(presenter) = self.presenter.as_mut() else {
            return;
        };

        let now = Instant::now();
        let delta_time = (now - self.last_frame_time).as_secs_f32();
        self.last_frame_time = now;

        match self.renderer.step(presenter, delta_time) {
            Ok(LoopState::Quitting) => event_loop.exit(),
            Ok(_) => presenter.request_redraw(),
            Err(e) => self.fail(event_loop, anyhow::Error::new(e).context("Render loop failed")),
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.presenter.is_some() {
            return;
        }

        let (width, height) = self.config.frame_size();
        let window_attrs = Window::default_attributes()
            .with_title(self.title.clone())
            .with_inner_size(winit::dpi::PhysicalSize::new(width, height));

        let window = match event_loop.create_window(window_attrs) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                self.fail(event_loop, anyhow::Error::new(e).context("Failed to create window"));
                return;
            }
        };

        let presenter = pollster::block_on(WindowPresenter::new(
            window,
            self.config.frame_size(),
            self.config.show_ui,
            self.config.screenshot_dir.clone(),
        ));
        match presenter {
            Ok(presenter) => {
                presenter.request_redraw();
                self.presenter = Some(presenter);
                self.last_frame_time = Instant::now();
                log::info!("Window and presenter initialized");
            }
            Err(e) => self.fail(event_loop, e.context("Failed to initialize presenter")),
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        let Some(presenter) = self.presenter.as_mut() else {
            return;
        };

        // Let egui handle the event first
        if presenter.handle_egui_event(&event) {
            return;
        }

        match event {
            WindowEvent::CloseRequested => {
                log::info!("Close requested");
                presenter.input.request_quit();
                self.advance(event_loop);
            }
            WindowEvent::Resized(physical_size) => {
                presenter.resize((physical_size.width, physical_size.height));
                log::info!("Resized to {}x{}", physical_size.width, physical_size.height);
            }
            WindowEvent::Focused(false) => presenter.input.release_all(),
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key,
                        state,
                        repeat,
                        ..
                    },
                ..
            } => {
                if let PhysicalKey::Code(keycode) = physical_key {
                    presenter
                        .input
                        .key(keycode, state == ElementState::Pressed, repeat);
                }
            }
            WindowEvent::RedrawRequested => self.advance(event_loop),
            _ => {}
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let args = parse_args(std::env::args().skip(1))?;
    let config = ViewerConfig::load(args.config.as_deref())?;

    log::info!("Starting Lumen Viewer");

    let manager = GpuResourceManager::initialize(&config.device_config()?)
        .context("Failed to initialize GPU")?;
    let source = SceneFile::new(&args.scene, config.load_options());
    let renderer = ProgressiveRenderer::new(manager, source, config.loop_config())
        .with_context(|| format!("Failed to load scene {}", args.scene.display()))?;

    let title = match args.scene.file_name() {
        Some(name) => format!("Lumen - {}", name.to_string_lossy()),
        None => "Lumen".to_string(),
    };

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new(renderer, config, title);

    log::info!("Running event loop");
    event_loop.run_app(&mut app)?;

    match app.error {
        Some(error) => Err(error),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Result<Args> {
        parse_args(list.iter().map(|s| s.to_string()))
    }

    #[test]
    fn test_scene_only() {
        let parsed = args(&["scenes/demo.json"]).unwrap();
        assert_eq!(parsed.scene, PathBuf::from("scenes/demo.json"));
        assert_eq!(parsed.config, None);
    }

    #[test]
    fn test_config_flag() {
        let parsed = args(&["--config", "viewer.json", "scene.json"]).unwrap();
        assert_eq!(parsed.scene, PathBuf::from("scene.json"));
        assert_eq!(parsed.config, Some(PathBuf::from("viewer.json")));
    }

    #[test]
    fn test_bad_arguments() {
        assert!(args(&[]).is_err());
        assert!(args(&["scene.json", "--config"]).is_err());
        assert!(args(&["scene.json", "--samples", "4"]).is_err());
        assert!(args(&["a.json", "b.json"]).is_err());
    }
}
