//! Viewer configuration file.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use lumen_core::LoadOptions;
use lumen_render::{DeviceConfig, LoopConfig, RedrawPolicy};
use serde::Deserialize;

/// How often the kernel runs.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RedrawMode {
    #[default]
    Continuous,
    OnDemand,
}

impl From<RedrawMode> for RedrawPolicy {
    fn from(mode: RedrawMode) -> Self {
        match mode {
            RedrawMode::Continuous => RedrawPolicy::Continuous,
            RedrawMode::OnDemand => RedrawPolicy::OnDemand,
        }
    }
}

/// Settings read from `--config <file>`; every field is optional.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ViewerConfig {
    pub width: u32,
    pub height: u32,
    pub samples_per_frame: u32,
    pub target_samples: Option<u32>,
    pub redraw: RedrawMode,

    /// WGSL kernel replacing the built-in one
    pub kernel: Option<PathBuf>,

    pub texture_dir: PathBuf,
    pub normal_dir: PathBuf,
    pub move_speed: f32,
    pub turn_speed: f32,
    pub show_ui: bool,
    pub screenshot_dir: PathBuf,

    /// Fixed random seed for reproducible frames
    pub seed: Option<u64>,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            samples_per_frame: 1,
            target_samples: None,
            redraw: RedrawMode::Continuous,
            kernel: None,
            texture_dir: PathBuf::from("textures"),
            normal_dir: PathBuf::from("normals"),
            move_speed: 2.0,
            turn_speed: 1.0,
            show_ui: true,
            screenshot_dir: PathBuf::from("."),
            seed: None,
        }
    }
}

impl ViewerConfig {
    /// Read a config file, or use defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config = Self::from_json(&content)
            .with_context(|| format!("Invalid config {}", path.display()))?;
        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(content)?;
        anyhow::ensure!(
            config.width > 0 && config.height > 0,
            "frame size must be non-zero, got {}x{}",
            config.width,
            config.height
        );
        anyhow::ensure!(config.samples_per_frame > 0, "samples_per_frame must be at least 1");
        Ok(config)
    }

    pub fn frame_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn device_config(&self) -> Result<DeviceConfig> {
        let mut config = DeviceConfig {
            frame_size: self.frame_size(),
            seed: self.seed,
            ..Default::default()
        };
        if let Some(kernel) = &self.kernel {
            config.kernel_source = std::fs::read_to_string(kernel)
                .with_context(|| format!("Failed to read kernel {}", kernel.display()))?;
            log::info!("Using kernel {}", kernel.display());
        }
        Ok(config)
    }

    pub fn loop_config(&self) -> LoopConfig {
        LoopConfig {
            samples_per_frame: self.samples_per_frame,
            target_samples: self.target_samples,
            redraw: self.redraw.into(),
            move_speed: self.move_speed,
            turn_speed: self.turn_speed,
        }
    }

    pub fn load_options(&self) -> LoadOptions {
        LoadOptions {
            texture_dir: self.texture_dir.clone(),
            normal_dir: self.normal_dir.clone(),
            frame_size: self.frame_size(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_is_default() {
        assert_eq!(ViewerConfig::from_json("{}").unwrap(), ViewerConfig::default());
    }

    #[test]
    fn test_partial_config() {
        let config = ViewerConfig::from_json(
            r#"{ "width": 640, "height": 360, "target_samples": 256, "redraw": "on_demand" }"#,
        )
        .unwrap();

        assert_eq!(config.frame_size(), (640, 360));
        assert_eq!(config.samples_per_frame, 1);

        let loop_config = config.loop_config();
        assert_eq!(loop_config.target_samples, Some(256));
        assert_eq!(loop_config.redraw, RedrawPolicy::OnDemand);
        assert_eq!(config.load_options().frame_size, (640, 360));
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        assert!(ViewerConfig::from_json(r#"{ "widht": 640 }"#).is_err());
    }

    #[test]
    fn test_zero_frame_is_rejected() {
        assert!(ViewerConfig::from_json(r#"{ "width": 0 }"#).is_err());
        assert!(ViewerConfig::from_json(r#"{ "samples_per_frame": 0 }"#).is_err());
    }

    #[test]
    fn test_missing_kernel_file_is_fatal() {
        let config = ViewerConfig {
            kernel: Some(PathBuf::from("does/not/exist.wgsl")),
            ..Default::default()
        };
        assert!(config.device_config().is_err());
    }

    #[test]
    fn test_default_device_config_uses_builtin_kernel() {
        let device = ViewerConfig::default().device_config().unwrap();
        assert_eq!(device.frame_size, (1280, 720));
        assert_eq!(device.kernel_source, lumen_render::DEFAULT_KERNEL);
    }
}
