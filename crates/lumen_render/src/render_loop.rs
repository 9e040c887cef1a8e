//! Progressive render loop.
//!
//! Drives one kernel invocation per displayed frame, keeps the accumulated
//! sample count, and resets accumulation when the camera moves or the
//! scene is reloaded. The GPU and the window are reached through the
//! [`RenderBackend`] and [`Presenter`] traits.

use std::path::PathBuf;
use std::time::Instant;

use lumen_core::{load_scene, Camera, LoadOptions, LoadedScene, SceneResult, EFFECT_COUNT};
use lumen_math::{Vec2, Vec3};

use crate::config::{LoopConfig, RedrawPolicy};
use crate::error::{GpuResult, LoopResult, PresentError};
use crate::layout::GpuCamera;

/// Input flag bit toggled by the user and passed through to the kernel.
pub const INPUT_FLAG_MODIFIER: u32 = 1;

/// Interval over which fps and sample rate are averaged, in seconds.
const STATS_INTERVAL: f32 = 0.5;

/// Where the loop is.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LoopState {
    /// Nothing to render; the last frame is re-presented.
    Idle,
    /// Invoking the kernel every frame.
    Accumulating,
    /// The target sample count was reached.
    Finished,
    /// A quit signal arrived and the backend has been released.
    Quitting,
}

/// Scalar and struct kernel arguments for one frame.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct FrameArguments {
    pub object_count: u32,
    pub sample_count: u32,
    pub camera: GpuCamera,
    pub input_flags: u32,
}

/// Compute side of the loop.
pub trait RenderBackend {
    fn frame_size(&self) -> (u32, u32);

    fn object_count(&self) -> u32;

    /// (Re)create every buffer for a scene and bind the kernel arguments.
    fn load(&mut self, scene: &LoadedScene) -> GpuResult<()>;

    /// Clear the per-pixel running averages.
    fn reset_accumulation(&mut self) -> GpuResult<()>;

    /// Invoke the kernel and block until it completes.
    fn render(&mut self, args: &FrameArguments) -> GpuResult<()>;

    /// Read back the output image (`width * height` ARGB words).
    fn read_output(&mut self) -> GpuResult<Vec<u32>>;

    fn release(&mut self);
}

/// Source of the scene, re-read on reload.
pub trait SceneSource {
    fn load(&mut self) -> SceneResult<LoadedScene>;
}

/// A scene file on disk.
#[derive(Clone, Debug)]
pub struct SceneFile {
    pub path: PathBuf,
    pub options: LoadOptions,
}

impl SceneFile {
    pub fn new(path: impl Into<PathBuf>, options: LoadOptions) -> Self {
        Self {
            path: path.into(),
            options,
        }
    }
}

impl SceneSource for SceneFile {
    fn load(&mut self) -> SceneResult<LoadedScene> {
        load_scene(&self.path, &self.options)
    }
}

/// Input gathered by the presenter for one iteration.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FrameInput {
    pub quit: bool,

    /// Camera translation axes (right, up, forward), each in [-1, 1]
    pub movement: Vec3,

    /// Camera rotation axes (yaw, pitch), each in [-1, 1]
    pub rotation: Vec2,

    pub next_camera: bool,
    pub reload: bool,

    /// Post effect selected this frame
    pub effect: Option<u32>,

    /// Brightness set this frame
    pub brightness: Option<f32>,

    pub toggle_modifier: bool,

    /// Explicit redraw request (expose, resize)
    pub redraw: bool,
}

impl FrameInput {
    pub fn moves_camera(&self) -> bool {
        self.movement != Vec3::ZERO || self.rotation != Vec2::ZERO
    }
}

/// Snapshot of the loop handed to the presenter.
#[derive(Clone, Debug, PartialEq)]
pub struct FrameStatus {
    pub state: LoopState,
    pub samples: u32,
    pub target_samples: Option<u32>,
    pub fps: f32,
    pub samples_per_second: f32,
    pub frame_size: (u32, u32),
    pub object_count: u32,
    pub camera_index: usize,
    pub camera_count: usize,
    pub camera: Camera,
    pub input_flags: u32,
}

/// Presentation side of the loop.
pub trait Presenter {
    /// Pump pending window events and report what the user did.
    fn pump_events(&mut self, status: &FrameStatus) -> FrameInput;

    /// Display a `width * height` ARGB frame.
    fn present(&mut self, frame: &[u32], status: &FrameStatus) -> Result<(), PresentError>;
}

/// Frame timing statistics.
#[derive(Clone, Debug, Default)]
pub struct FrameStats {
    pub fps: f32,
    pub samples_per_second: f32,
    pub total_frames: u64,
    frame_count: u32,
    sample_count: u32,
    timer: f32,
}

impl FrameStats {
    /// Record one iteration. Returns true when the averages were refreshed.
    pub fn update(&mut self, delta_time: f32, samples_added: u32) -> bool {
        self.total_frames += 1;
        self.frame_count += 1;
        self.sample_count += samples_added;
        self.timer += delta_time;

        if self.timer >= STATS_INTERVAL {
            self.fps = self.frame_count as f32 / self.timer;
            self.samples_per_second = self.sample_count as f32 / self.timer;
            self.frame_count = 0;
            self.sample_count = 0;
            self.timer = 0.0;
            return true;
        }
        false
    }
}

/// The progressive render loop.
pub struct ProgressiveRenderer<B: RenderBackend, S: SceneSource> {
    backend: B,
    source: S,
    config: LoopConfig,
    cameras: Vec<Camera>,
    active_camera: usize,
    samples: u32,
    input_flags: u32,
    state: LoopState,
    redraw: bool,
    frame: Vec<u32>,
    stats: FrameStats,
}

impl<B: RenderBackend, S: SceneSource> ProgressiveRenderer<B, S> {
    /// Load the scene from `source` into `backend`.
    pub fn new(mut backend: B, mut source: S, config: LoopConfig) -> LoopResult<Self> {
        let loaded = source.load()?;
        backend.load(&loaded)?;

        let (width, height) = backend.frame_size();
        let mut renderer = Self {
            backend,
            source,
            config,
            cameras: Vec::new(),
            active_camera: 0,
            samples: 0,
            input_flags: 0,
            state: LoopState::Idle,
            redraw: true,
            frame: vec![0; (width * height) as usize],
            stats: FrameStats::default(),
        };
        renderer.set_cameras(loaded.scene.cameras);
        Ok(renderer)
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn samples(&self) -> u32 {
        self.samples
    }

    pub fn stats(&self) -> &FrameStats {
        &self.stats
    }

    /// Last frame read back from the backend.
    pub fn frame(&self) -> &[u32] {
        &self.frame
    }

    pub fn active_camera(&self) -> &Camera {
        &self.cameras[self.active_camera]
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Give the backend back to the caller.
    pub fn into_backend(self) -> B {
        self.backend
    }

    /// Run until a quit signal arrives.
    pub fn run<P: Presenter + ?Sized>(&mut self, presenter: &mut P) -> LoopResult<()> {
        let mut last_frame_time = Instant::now();
        while self.state != LoopState::Quitting {
            let now = Instant::now();
            let delta_time = (now - last_frame_time).as_secs_f32();
            last_frame_time = now;
            self.step(presenter, delta_time)?;
        }
        Ok(())
    }

    /// One iteration: pump input, render if needed, present.
    pub fn step<P: Presenter + ?Sized>(
        &mut self,
        presenter: &mut P,
        delta_time: f32,
    ) -> LoopResult<LoopState> {
        if self.state == LoopState::Quitting {
            return Ok(self.state);
        }

        let input = presenter.pump_events(&self.status());
        if input.quit {
            self.quit();
            return Ok(self.state);
        }

        let mut reset = false;
        if input.reload {
            self.reload()?;
            reset = true;
        }
        if input.next_camera && self.cameras.len() > 1 {
            self.active_camera = (self.active_camera + 1) % self.cameras.len();
            log::info!("Switched to camera {}/{}", self.active_camera + 1, self.cameras.len());
            reset = true;
        }
        if input.moves_camera() {
            self.move_camera(&input, delta_time);
            reset = true;
        }
        if reset {
            self.reset_accumulation()?;
        }

        let ui_changed = self.apply_ui(&input);
        let finished = self.state == LoopState::Finished;
        if input.redraw && !finished {
            self.redraw = true;
        }

        // A finished frame is re-presented as is; only display edits re-shade it
        let mut samples_added = 0;
        if ui_changed || (self.redraw && !finished) {
            samples_added = self.render_frame()?;
        } else if !finished {
            self.state = LoopState::Idle;
        }

        if self.stats.update(delta_time, samples_added) {
            log::debug!(
                "{:.1} fps, {:.1} samples/s, {} samples accumulated",
                self.stats.fps,
                self.stats.samples_per_second,
                self.samples
            );
        }

        presenter.present(&self.frame, &self.status())?;
        Ok(self.state)
    }

    fn render_frame(&mut self) -> LoopResult<u32> {
        let increment = if self.state == LoopState::Finished {
            0
        } else {
            self.config.samples_per_frame.max(1)
        };
        self.samples = self.samples.saturating_add(increment);

        let args = self.frame_arguments();
        self.backend.render(&args)?;
        self.frame = self.backend.read_output()?;

        let finished = self
            .config
            .target_samples
            .is_some_and(|target| self.samples >= target);
        if finished {
            if self.state != LoopState::Finished {
                log::info!("Reached {} samples", self.samples);
            }
            self.state = LoopState::Finished;
            self.redraw = false;
        } else {
            self.state = LoopState::Accumulating;
        }

        if self.config.redraw == RedrawPolicy::OnDemand {
            self.redraw = false;
        }
        Ok(increment)
    }

    /// Kernel arguments for the current camera and sample count.
    pub fn frame_arguments(&self) -> FrameArguments {
        FrameArguments {
            object_count: self.backend.object_count(),
            sample_count: self.samples,
            camera: GpuCamera::from(self.active_camera()),
            input_flags: self.input_flags,
        }
    }

    /// Start accumulating from zero.
    pub fn reset_accumulation(&mut self) -> GpuResult<()> {
        log::debug!("Resetting accumulation after {} samples", self.samples);
        self.samples = 0;
        self.backend.reset_accumulation()?;
        self.redraw = true;
        self.state = LoopState::Accumulating;
        Ok(())
    }

    fn reload(&mut self) -> LoopResult<()> {
        log::info!("Reloading scene");
        let loaded = self.source.load()?;
        self.backend.load(&loaded)?;
        self.set_cameras(loaded.scene.cameras);
        Ok(())
    }

    fn set_cameras(&mut self, cameras: Vec<Camera>) {
        let (width, height) = self.backend.frame_size();
        self.cameras = cameras;
        for camera in &mut self.cameras {
            camera.reconfigure(width, height);
        }
        if self.cameras.is_empty() {
            // A parsed scene always has a camera; keep the loop usable anyway
            let mut camera = Camera::new(Vec3::ZERO, Vec3::NEG_Z, Vec3::Y);
            camera.reconfigure(width, height);
            self.cameras.push(camera);
        }
        self.active_camera = self.active_camera.min(self.cameras.len() - 1);
    }

    fn move_camera(&mut self, input: &FrameInput, delta_time: f32) {
        let step = self.config.move_speed * delta_time;
        let turn = self.config.turn_speed * delta_time;
        let camera = &mut self.cameras[self.active_camera];

        if input.movement != Vec3::ZERO {
            let m = input.movement * step;
            camera.translate_local(m.x, m.y, m.z);
        }
        if input.rotation != Vec2::ZERO {
            camera.rotate(input.rotation.x * turn, input.rotation.y * turn);
        }
    }

    /// Apply overlay/key edits that do not invalidate accumulation.
    fn apply_ui(&mut self, input: &FrameInput) -> bool {
        let mut changed = false;
        let camera = &mut self.cameras[self.active_camera];

        if let Some(effect) = input.effect {
            let effect = effect.min(EFFECT_COUNT - 1);
            if effect != camera.effect {
                camera.effect = effect;
                changed = true;
            }
        }
        if let Some(brightness) = input.brightness {
            let brightness = brightness.max(0.0);
            if brightness != camera.brightness {
                camera.brightness = brightness;
                changed = true;
            }
        }
        if input.toggle_modifier {
            self.input_flags ^= INPUT_FLAG_MODIFIER;
            changed = true;
        }
        changed
    }

    fn quit(&mut self) {
        log::info!("Quitting after {} frames", self.stats.total_frames);
        self.backend.release();
        self.state = LoopState::Quitting;
    }

    /// Snapshot for the presenter.
    pub fn status(&self) -> FrameStatus {
        FrameStatus {
            state: self.state,
            samples: self.samples,
            target_samples: self.config.target_samples,
            fps: self.stats.fps,
            samples_per_second: self.stats.samples_per_second,
            frame_size: self.backend.frame_size(),
            object_count: self.backend.object_count(),
            camera_index: self.active_camera,
            camera_count: self.cameras.len(),
            camera: *self.active_camera(),
            input_flags: self.input_flags,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    use lumen_core::{FileDecoder, ResourceRegistry, SceneParser};

    const SCENE: &str = r#"{
        "objects": [
            { "type": "sphere", "position": [0, 0, 0], "color": [1, 1, 1], "radius": 1 },
            { "type": "plane", "position": [0, -1, 0], "dir": [0, 1, 0], "color": [1, 1, 1] }
        ],
        "cameras": [
            { "position": [0, 0, 5], "dir": [0, 0, -1] },
            { "position": [5, 0, 0], "dir": [-1, 0, 0] }
        ]
    }"#;

    struct MemorySource {
        loads: usize,
    }

    impl SceneSource for MemorySource {
        fn load(&mut self) -> SceneResult<LoadedScene> {
            self.loads += 1;
            let mut textures = ResourceRegistry::textures(Box::new(FileDecoder::new(".")));
            let mut normals = ResourceRegistry::normals(Box::new(FileDecoder::new(".")));
            let scene = SceneParser::new(&mut textures, &mut normals, (4, 2)).parse_str(SCENE)?;
            Ok(LoadedScene {
                path: PathBuf::from("memory.json"),
                scene,
                textures,
                normals,
            })
        }
    }

    #[derive(Default)]
    struct MockBackend {
        loads: usize,
        resets: usize,
        renders: Vec<FrameArguments>,
        released: bool,
        objects: u32,
    }

    impl RenderBackend for MockBackend {
        fn frame_size(&self) -> (u32, u32) {
            (4, 2)
        }

        fn object_count(&self) -> u32 {
            self.objects
        }

        fn load(&mut self, scene: &LoadedScene) -> GpuResult<()> {
            self.loads += 1;
            self.objects = scene.scene.objects.len() as u32;
            self.released = false;
            Ok(())
        }

        fn reset_accumulation(&mut self) -> GpuResult<()> {
            self.resets += 1;
            Ok(())
        }

        fn render(&mut self, args: &FrameArguments) -> GpuResult<()> {
            self.renders.push(*args);
            Ok(())
        }

        fn read_output(&mut self) -> GpuResult<Vec<u32>> {
            let samples = self.renders.last().map_or(0, |a| a.sample_count);
            Ok(vec![samples; 8])
        }

        fn release(&mut self) {
            self.released = true;
        }
    }

    /// Replays scripted input, then asks to quit.
    struct ScriptedPresenter {
        script: VecDeque<FrameInput>,
        presented: Vec<(Vec<u32>, FrameStatus)>,
    }

    impl ScriptedPresenter {
        fn new(script: Vec<FrameInput>) -> Self {
            Self {
                script: script.into(),
                presented: Vec::new(),
            }
        }

        fn idle(frames: usize) -> Self {
            Self::new(vec![FrameInput::default(); frames])
        }
    }

    impl Presenter for ScriptedPresenter {
        fn pump_events(&mut self, _status: &FrameStatus) -> FrameInput {
            self.script.pop_front().unwrap_or(FrameInput {
                quit: true,
                ..Default::default()
            })
        }

        fn present(&mut self, frame: &[u32], status: &FrameStatus) -> Result<(), PresentError> {
            self.presented.push((frame.to_vec(), status.clone()));
            Ok(())
        }
    }

    fn renderer(config: LoopConfig) -> ProgressiveRenderer<MockBackend, MemorySource> {
        ProgressiveRenderer::new(MockBackend::default(), MemorySource { loads: 0 }, config).unwrap()
    }

    fn sample_counts(renderer: &ProgressiveRenderer<MockBackend, MemorySource>) -> Vec<u32> {
        renderer.backend().renders.iter().map(|a| a.sample_count).collect()
    }

    #[test]
    fn test_samples_accumulate_without_reset() {
        let mut r = renderer(LoopConfig::default());
        let mut presenter = ScriptedPresenter::idle(5);
        r.run(&mut presenter).unwrap();

        assert_eq!(sample_counts(&r), vec![1, 2, 3, 4, 5]);
        assert_eq!(r.backend().resets, 0);
        assert_eq!(presenter.presented.len(), 5);
        assert_eq!(presenter.presented[4].0, vec![5; 8]);
    }

    #[test]
    fn test_samples_per_frame_increment() {
        let mut r = renderer(LoopConfig {
            samples_per_frame: 4,
            ..Default::default()
        });
        r.run(&mut ScriptedPresenter::idle(3)).unwrap();
        assert_eq!(sample_counts(&r), vec![4, 8, 12]);
    }

    #[test]
    fn test_camera_motion_resets_accumulation() {
        let mut r = renderer(LoopConfig::default());
        let moving = FrameInput {
            movement: Vec3::new(0.0, 0.0, 1.0),
            ..Default::default()
        };
        let script = vec![FrameInput::default(), FrameInput::default(), moving, FrameInput::default()];
        r.run(&mut ScriptedPresenter::new(script)).unwrap();

        assert_eq!(sample_counts(&r), vec![1, 2, 1, 2]);
        assert_eq!(r.backend().resets, 1);
    }

    #[test]
    fn test_step_moves_active_camera() {
        let mut r = renderer(LoopConfig {
            move_speed: 2.0,
            ..Default::default()
        });
        let mut presenter = ScriptedPresenter::new(vec![FrameInput {
            movement: Vec3::new(0.0, 0.0, 1.0),
            ..Default::default()
        }]);
        r.step(&mut presenter, 0.5).unwrap();

        let position = r.active_camera().position;
        assert!((position - Vec3::new(0.0, 0.0, 4.0)).length() < 1e-5);
        assert_eq!(r.samples(), 1);
    }

    #[test]
    fn test_target_samples_finishes() {
        let mut r = renderer(LoopConfig {
            samples_per_frame: 2,
            target_samples: Some(4),
            ..Default::default()
        });
        let mut presenter = ScriptedPresenter::idle(5);
        r.run(&mut presenter).unwrap();

        assert_eq!(sample_counts(&r), vec![2, 4]);
        // Finished frames are still presented
        assert_eq!(presenter.presented.len(), 5);
        assert_eq!(presenter.presented[4].1.state, LoopState::Finished);
    }

    #[test]
    fn test_finished_frame_is_not_extended() {
        let mut r = renderer(LoopConfig {
            target_samples: Some(2),
            ..Default::default()
        });
        let mut presenter = ScriptedPresenter::new(vec![
            FrameInput::default(),
            FrameInput::default(),
            FrameInput {
                redraw: true,
                ..Default::default()
            },
            FrameInput {
                brightness: Some(2.0),
                ..Default::default()
            },
        ]);
        for _ in 0..4 {
            r.step(&mut presenter, 0.016).unwrap();
        }

        // The redraw re-presents; the brightness edit re-shades at the same count
        assert_eq!(sample_counts(&r), vec![1, 2, 2]);
        assert_eq!(r.samples(), 2);
        assert_eq!(r.state(), LoopState::Finished);
        assert_eq!(presenter.presented.len(), 4);
    }

    #[test]
    fn test_on_demand_idles_until_redraw() {
        let mut r = renderer(LoopConfig {
            redraw: RedrawPolicy::OnDemand,
            ..Default::default()
        });
        let mut presenter = ScriptedPresenter::new(vec![
            FrameInput::default(),
            FrameInput::default(),
            FrameInput {
                redraw: true,
                ..Default::default()
            },
        ]);

        assert_eq!(r.step(&mut presenter, 0.016).unwrap(), LoopState::Accumulating);
        assert_eq!(r.step(&mut presenter, 0.016).unwrap(), LoopState::Idle);
        assert_eq!(r.step(&mut presenter, 0.016).unwrap(), LoopState::Accumulating);
        assert_eq!(sample_counts(&r), vec![1, 2]);
        assert_eq!(presenter.presented.len(), 3);
    }

    #[test]
    fn test_ui_change_renders_without_reset() {
        let mut r = renderer(LoopConfig {
            redraw: RedrawPolicy::OnDemand,
            ..Default::default()
        });
        let mut presenter = ScriptedPresenter::new(vec![
            FrameInput::default(),
            FrameInput {
                effect: Some(3),
                ..Default::default()
            },
            FrameInput {
                toggle_modifier: true,
                ..Default::default()
            },
        ]);
        for _ in 0..3 {
            r.step(&mut presenter, 0.016).unwrap();
        }

        let renders = &r.backend().renders;
        assert_eq!(sample_counts(&r), vec![1, 2, 3]);
        assert_eq!(renders[1].camera.effect, 3);
        assert_eq!(renders[2].input_flags, INPUT_FLAG_MODIFIER);
        assert_eq!(r.backend().resets, 0);
    }

    #[test]
    fn test_reload_recreates_and_resets() {
        let mut r = renderer(LoopConfig::default());
        let script = vec![
            FrameInput::default(),
            FrameInput {
                reload: true,
                ..Default::default()
            },
        ];
        r.run(&mut ScriptedPresenter::new(script)).unwrap();

        assert_eq!(r.backend().loads, 2);
        assert_eq!(r.backend().resets, 1);
        assert_eq!(sample_counts(&r), vec![1, 1]);
        assert_eq!(r.backend().renders[1].object_count, 2);
    }

    #[test]
    fn test_next_camera_cycles() {
        let mut r = renderer(LoopConfig::default());
        let next = FrameInput {
            next_camera: true,
            ..Default::default()
        };
        let mut presenter = ScriptedPresenter::new(vec![next.clone(), next]);

        r.step(&mut presenter, 0.016).unwrap();
        assert_eq!(r.status().camera_index, 1);
        assert_eq!(r.active_camera().position, Vec3::new(5.0, 0.0, 0.0));
        r.step(&mut presenter, 0.016).unwrap();
        assert_eq!(r.status().camera_index, 0);
        assert_eq!(r.backend().resets, 2);
    }

    #[test]
    fn test_quit_releases_backend() {
        let mut r = renderer(LoopConfig::default());
        r.run(&mut ScriptedPresenter::idle(1)).unwrap();

        assert_eq!(r.state(), LoopState::Quitting);
        let backend = r.into_backend();
        assert!(backend.released);
    }

    #[test]
    fn test_cameras_match_backend_frame() {
        let r = renderer(LoopConfig::default());
        assert_eq!(r.active_camera().resolution, (4, 2));
        assert_eq!(r.frame().len(), 8);
    }

    #[test]
    fn test_frame_stats_window() {
        let mut stats = FrameStats::default();
        assert!(!stats.update(0.2, 1));
        assert!(!stats.update(0.2, 1));
        assert!(stats.update(0.2, 1));
        assert!((stats.fps - 5.0).abs() < 1e-3);
        assert!((stats.samples_per_second - 5.0).abs() < 1e-3);
        assert_eq!(stats.total_frames, 3);
    }
}
