//! Decoded texture data ready for upload

use std::path::Path;

use crate::assets::AssetError;
use crate::render::ResourceDesc;

/// RGBA8 pixels decoded off the render thread
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureData {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Tightly packed RGBA8 rows
    pub rgba: Vec<u8>,
}

impl TextureData {
    /// Wrap raw pixels, checking the buffer length
    pub fn from_rgba(width: u32, height: u32, rgba: Vec<u8>) -> Result<Self, AssetError> {
        let expected = u64::from(width) * u64::from(height) * 4;
        if width == 0 || height == 0 || rgba.len() as u64 != expected {
            return Err(AssetError::InvalidData(format!(
                "{width}x{height} texture needs {expected} bytes, got {}",
                rgba.len()
            )));
        }
        Ok(Self { width, height, rgba })
    }

    /// Decode an encoded image (PNG) from memory
    pub fn decode(bytes: &[u8]) -> Result<Self, AssetError> {
        let image = image::load_from_memory(bytes)
            .map_err(|e| AssetError::InvalidData(format!("failed to decode image: {e}")))?
            .to_rgba8();
        let (width, height) = image.dimensions();
        log::debug!("Decoded {}x{} texture from memory", width, height);
        Self::from_rgba(width, height, image.into_raw())
    }

    /// Load and decode an image file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, AssetError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(AssetError::NotFound(path.display().to_string()));
        }
        let image = image::open(path)
            .map_err(|e| AssetError::LoadFailed {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?
            .to_rgba8();
        let (width, height) = image.dimensions();
        log::info!("Loaded {}x{} texture from {:?}", width, height, path);
        Self::from_rgba(width, height, image.into_raw())
    }

    /// Single-color texture
    pub fn solid(width: u32, height: u32, color: [u8; 4]) -> Self {
        let pixels = width as usize * height as usize;
        Self {
            width,
            height,
            rgba: color.repeat(pixels),
        }
    }

    /// Upload description for this texture
    pub fn to_desc(&self, label: impl Into<String>) -> ResourceDesc {
        ResourceDesc::texture(label, self.width, self.height, self.rgba.clone())
    }
}
