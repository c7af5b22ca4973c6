pub mod report;

use std::path::Path;

use image::RgbImage;

use crate::{binary::BinaryMask, error::Result};

pub use report::DetectionReport;

/// Load any supported image file as 8-bit RGB.
pub fn load_rgb(path: impl AsRef<Path>) -> Result<RgbImage> {
    Ok(image::open(path)?.to_rgb8())
}

pub fn load_rgb_from_bytes(bytes: &[u8]) -> Result<RgbImage> {
    Ok(image::load_from_memory(bytes)?.to_rgb8())
}

impl BinaryMask {
    /// Save as an 8-bit grayscale image, 255 where masked.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        self.as_luma().save(path)?;
        Ok(())
    }
}
