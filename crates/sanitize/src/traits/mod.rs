use image::RgbImage;
use tracing::{debug, warn};

use crate::{
    error::{Result, SanitizeError},
    types::Detection,
};

/// A strategy that finds content intruding into a glyph crop.
///
/// Implementors only provide [`try_detect`](Self::try_detect). Callers use
/// [`detect`](Self::detect), which turns recoverable failures (no content, an
/// undefined threshold) into an absent detection so one strategy cannot abort
/// a batch. Input-size rejections still surface as errors.
pub trait IntruderDetector: Send + Sync {
    /// Short identifier used in logs and reports.
    fn name(&self) -> &'static str;

    fn try_detect(&self, image: &RgbImage) -> Result<Detection>;

    fn detect(&self, image: &RgbImage) -> Result<Detection> {
        match self.try_detect(image) {
            Err(err) if err.is_recoverable() => {
                if let SanitizeError::AlgorithmFault(_) = err {
                    warn!(strategy = self.name(), "{err}");
                } else {
                    debug!(strategy = self.name(), "{err}");
                }
                Ok(Detection::absent(image.width(), image.height(), err.to_string()))
            }
            other => other,
        }
    }
}
