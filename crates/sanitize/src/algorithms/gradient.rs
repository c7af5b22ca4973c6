use image::RgbImage;
use imageproc::filter::filter3x3;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    algorithms::{
        preprocessing::{to_grayscale, validate_dimensions, Grayscale},
        profile::{find_peaks, max_value, PeakCriteria},
    },
    error::{Result, SanitizeError},
    traits::IntruderDetector,
    types::{Detection, DiagnosticData, Diagnostics, IntruderRegion, MaskBoundaries},
};

#[rustfmt::skip]
const HORIZONTAL_SOBEL: [f32; 9] = [
    -1.0, 0.0, 1.0,
    -2.0, 0.0, 2.0,
    -1.0, 0.0, 1.0];

#[derive(Debug, Clone, Serialize)]
pub struct GradientDiagnostics {
    /// Column sums of the absolute horizontal gradient, scaled to `[0, 1]`.
    pub edge_strength: Vec<f64>,
    pub peaks: Vec<usize>,
}

/// Place boundaries at the strongest vertical edges near each side.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(default)]
pub struct GradientEdgeDetector {
    /// Minimum normalized edge strength for a peak.
    pub edge_threshold: f64,
    /// Minimum column distance between peaks.
    pub min_peak_distance: usize,
}

impl Default for GradientEdgeDetector {
    fn default() -> Self {
        Self {
            edge_threshold: 0.1,
            min_peak_distance: 10,
        }
    }
}

impl GradientEdgeDetector {
    /// Boundaries from a normalized edge-strength profile. Returns the peaks
    /// found as well.
    pub fn boundaries_from_profile(&self, strength: &[f64]) -> (Vec<usize>, MaskBoundaries) {
        let width = strength.len();
        let peaks = find_peaks(
            strength,
            &PeakCriteria {
                height: Some(self.edge_threshold),
                distance: Some(self.min_peak_distance),
                prominence: None,
            },
        );

        let left = strongest(strength, peaks.iter().copied().filter(|&p| p < width / 3));
        let right = strongest(strength, peaks.iter().copied().filter(|&p| p > 2 * width / 3));

        (peaks, MaskBoundaries::columns(left, right))
    }
}

/// Sum of the absolute horizontal Sobel response down each column, computed
/// on the real-valued luminance with edge pixels replicated.
pub fn column_edge_strength(gray: &Grayscale) -> Vec<f64> {
    let gradient: Grayscale = filter3x3(gray, &HORIZONTAL_SOBEL);
    let mut strength = vec![0f64; gray.width() as usize];
    for (x, _, g) in gradient.enumerate_pixels() {
        strength[x as usize] += (g[0] as f64).abs();
    }
    strength
}

fn strongest(strength: &[f64], candidates: impl Iterator<Item = usize>) -> Option<u32> {
    candidates
        .max_by(|&a, &b| strength[a].total_cmp(&strength[b]))
        .map(|p| p as u32)
}

impl IntruderDetector for GradientEdgeDetector {
    fn name(&self) -> &'static str {
        "gradient_edge"
    }

    fn try_detect(&self, image: &RgbImage) -> Result<Detection> {
        validate_dimensions(image)?;
        let gray = to_grayscale(image);
        let (w, h) = gray.dimensions();

        let mut strength = column_edge_strength(&gray);
        let max = max_value(&strength);
        if max <= 0.0 {
            return Err(SanitizeError::EmptyContent("no horizontal gradient".into()));
        }
        strength.iter_mut().for_each(|v| *v /= max);

        let (peaks, boundaries) = self.boundaries_from_profile(&strength);
        debug!(?peaks, ?boundaries, "gradient edges");

        Ok(Detection::new(
            w,
            h,
            IntruderRegion::from_boundaries(boundaries),
            Diagnostics::new(DiagnosticData::Gradient(GradientDiagnostics {
                edge_strength: strength,
                peaks,
            })),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_strongest_peak_per_side() {
        let mut strength = vec![0.0; 90];
        strength[5] = 0.4;
        strength[20] = 0.9;
        strength[45] = 1.0;
        strength[70] = 0.05;
        strength[80] = 0.6;
        let (peaks, b) = GradientEdgeDetector::default().boundaries_from_profile(&strength);
        assert_eq!(peaks, vec![5, 20, 45, 80]);
        assert_eq!(b.left, Some(20));
        assert_eq!(b.right, Some(80));
    }

    #[test]
    fn test_close_peaks_are_thinned() {
        let mut strength = vec![0.0; 60];
        strength[8] = 0.5;
        strength[12] = 0.7;
        let (peaks, b) = GradientEdgeDetector::default().boundaries_from_profile(&strength);
        assert_eq!(peaks, vec![12]);
        assert_eq!(b.left, Some(12));
        assert_eq!(b.right, None);
    }

    #[test]
    fn test_detects_stroke_edges() {
        // vertical stroke near the left edge, glyph in the middle
        let img = RgbImage::from_fn(90, 30, |x, _| {
            if (8..10).contains(&x) || (40..50).contains(&x) {
                Rgb([0, 0, 0])
            } else {
                Rgb([255, 255, 255])
            }
        });
        let result = GradientEdgeDetector::default().detect(&img).unwrap();
        let left = result.boundaries().left.unwrap();
        assert!((7..=10).contains(&left), "left boundary {left}");
        assert_eq!(result.boundaries().right, None);
    }

    #[test]
    fn test_strength_keeps_sub_level_contrast() {
        // 0.4 apart in luminance: both sides round to the same 8-bit level
        let gray = Grayscale::from_fn(20, 10, |x, _| image::Luma([if x < 10 { 100.1 } else { 100.5 }]));
        let strength = column_edge_strength(&gray);
        assert!(strength[9] > 0.0 && strength[10] > 0.0);
        assert!((strength[9] - 0.4 * 4.0 * 10.0).abs() < 1e-2);
        assert_eq!(strength[0], 0.0);
        assert_eq!(strength[19], 0.0);
    }

    #[test]
    fn test_flat_image_is_empty() {
        let img = RgbImage::from_pixel(30, 30, Rgb([90, 90, 90]));
        let err = GradientEdgeDetector::default().try_detect(&img).unwrap_err();
        assert!(matches!(err, SanitizeError::EmptyContent(_)));
    }
}
