//! Deduplicating registry for texture and normal-map images.
//!
//! Names map to integer indices used by the flat object buffer. Index 0 is
//! always a built-in 1x1 default image, so a reference that cannot be
//! resolved can fall back to 0 without a special case on the GPU side.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{ResourceError, ResourceResult};

/// A decoded image with packed ARGB pixels.
#[derive(Clone, Debug, PartialEq)]
pub struct Image {
    /// Image width in pixels
    pub width: u32,

    /// Image height in pixels
    pub height: u32,

    /// Pixel data as 0xAARRGGBB words, row-major order
    pub pixels: Vec<u32>,
}

impl Image {
    /// Create a new image from pixel data.
    pub fn new(width: u32, height: u32, pixels: Vec<u32>) -> Self {
        Self {
            width,
            height,
            pixels,
        }
    }

    /// Create a solid color image (1x1).
    pub fn solid(argb: u32) -> Self {
        Self::new(1, 1, vec![argb])
    }

    /// Get total size in bytes.
    pub fn size_bytes(&self) -> usize {
        self.pixels.len() * std::mem::size_of::<u32>()
    }
}

/// Decodes a named image resource into pixels.
pub trait ImageDecoder {
    fn decode(&mut self, name: &str) -> ResourceResult<Image>;
}

/// Decoder that loads files from a base directory with the `image` crate.
pub struct FileDecoder {
    base_dir: PathBuf,
}

impl FileDecoder {
    /// Create a decoder resolving names against `base_dir`.
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Resolve a name relative to the base directory.
    fn resolve_path(&self, name: &str) -> PathBuf {
        let path = Path::new(name);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }
}

impl ImageDecoder for FileDecoder {
    fn decode(&mut self, name: &str) -> ResourceResult<Image> {
        let path = self.resolve_path(name);
        let img = image::open(&path).map_err(|source| ResourceError::Decode {
            name: path.display().to_string(),
            source,
        })?;

        let rgba = img.to_rgba8();
        let (width, height) = rgba.dimensions();
        let pixels = rgba
            .pixels()
            .map(|p| pack_argb(p[0], p[1], p[2], p[3]))
            .collect();

        Ok(Image::new(width, height, pixels))
    }
}

/// Pack 8-bit channels into a 0xAARRGGBB word.
pub fn pack_argb(r: u8, g: u8, b: u8, a: u8) -> u32 {
    (a as u32) << 24 | (r as u32) << 16 | (g as u32) << 8 | b as u32
}

/// Name -> index registry of decoded images.
///
/// First registration wins; registering a known name returns its index
/// without decoding again.
pub struct ResourceRegistry {
    /// Registry label for logs ("texture", "normal")
    label: &'static str,

    /// Decoded images by index; index 0 is the default image
    images: Vec<Image>,

    /// Registered names by index (index 0 has no name)
    names: Vec<String>,

    /// Name lookup
    index: HashMap<String, u32>,

    decoder: Box<dyn ImageDecoder>,
}

impl ResourceRegistry {
    /// Create a registry whose index 0 is `default_image`.
    pub fn new(label: &'static str, default_image: Image, decoder: Box<dyn ImageDecoder>) -> Self {
        Self {
            label,
            images: vec![default_image],
            names: vec![String::new()],
            index: HashMap::new(),
            decoder,
        }
    }

    /// Texture registry: default is opaque white.
    pub fn textures(decoder: Box<dyn ImageDecoder>) -> Self {
        Self::new("texture", Image::solid(0xFFFF_FFFF), decoder)
    }

    /// Normal-map registry: default is the flat tangent-space normal.
    pub fn normals(decoder: Box<dyn ImageDecoder>) -> Self {
        Self::new("normal", Image::solid(pack_argb(128, 128, 255, 255)), decoder)
    }

    /// Register a name, decoding it on first sight.
    pub fn register(&mut self, name: &str) -> ResourceResult<u32> {
        if let Some(&idx) = self.index.get(name) {
            return Ok(idx);
        }

        let image = self.decoder.decode(name)?;
        let idx = self.images.len() as u32;

        log::debug!(
            "Loaded {} [{}] {}: {}x{}, {:.1} KB",
            self.label,
            idx,
            name,
            image.width,
            image.height,
            image.size_bytes() as f32 / 1024.0
        );

        self.images.push(image);
        self.names.push(name.to_string());
        self.index.insert(name.to_string(), idx);
        Ok(idx)
    }

    /// Exact, case-sensitive lookup of a registered name.
    pub fn lookup(&self, name: &str) -> Option<u32> {
        self.index.get(name).copied()
    }

    /// Get an image by index.
    pub fn get(&self, idx: u32) -> Option<&Image> {
        self.images.get(idx as usize)
    }

    /// All images in index order, default first.
    pub fn images(&self) -> &[Image] {
        &self.images
    }

    /// Registered names in index order (excluding the default).
    pub fn names(&self) -> &[String] {
        &self.names[1..]
    }

    /// Number of entries including the default.
    pub fn len(&self) -> usize {
        self.images.len()
    }

    /// True when nothing beyond the default has been registered.
    pub fn is_empty(&self) -> bool {
        self.images.len() == 1
    }

    /// Get total memory usage of decoded images.
    pub fn total_size_bytes(&self) -> usize {
        self.images.iter().map(Image::size_bytes).sum()
    }
}
