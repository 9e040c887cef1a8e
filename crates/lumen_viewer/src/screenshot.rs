//! PNG screenshots of the accumulated frame.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use image::RgbaImage;

/// Convert packed ARGB words to an RGBA image (alpha forced opaque).
pub fn frame_to_image(frame: &[u32], size: (u32, u32)) -> Option<RgbaImage> {
    let (width, height) = size;
    if frame.len() != (width as usize) * (height as usize) {
        return None;
    }

    let bytes = frame
        .iter()
        .flat_map(|&argb| {
            [
                (argb >> 16) as u8,
                (argb >> 8) as u8,
                argb as u8,
                0xFF,
            ]
        })
        .collect();
    RgbaImage::from_raw(width, height, bytes)
}

/// `lumen_<unix seconds>_<samples>spp.png` inside `dir`.
pub fn screenshot_path(dir: &Path, samples: u32) -> PathBuf {
    let seconds = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    dir.join(format!("lumen_{}_{}spp.png", seconds, samples))
}

pub fn save_screenshot(frame: &[u32], size: (u32, u32), dir: &Path, samples: u32) -> Result<PathBuf> {
    let image = frame_to_image(frame, size)
        .with_context(|| format!("Frame does not match {}x{}", size.0, size.1))?;
    let path = screenshot_path(dir, samples);
    image
        .save(&path)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(path)
}
