use std::collections::{BTreeSet, VecDeque};

use image::RgbImage;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    algorithms::{
        morphology::{label_components, neighbors8},
        preprocessing::{to_grayscale, validate_dimensions, Grayscale},
    },
    binary::BinaryMask,
    error::{Result, SanitizeError},
    traits::IntruderDetector,
    types::{Detection, DiagnosticData, Diagnostics, IntruderRegion, MaskBoundaries},
};

#[derive(Debug, Clone, Serialize)]
pub struct FloodFillDiagnostics {
    pub foreground_pixels: usize,
    pub num_components: u32,
    pub intruder_labels: Vec<u32>,
    #[serde(skip)]
    pub intruder_mask: BinaryMask,
}

/// Grow the background from the four corners and treat foreground touching
/// the border, but absent from the image centre, as intruding glyphs.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(default)]
pub struct FloodFillDetector {
    /// Largest absolute luminance difference from the seed pixel that still
    /// counts as background.
    pub tolerance: f32,
}

impl Default for FloodFillDetector {
    fn default() -> Self {
        Self { tolerance: 30.0 }
    }
}

/// Pixels 8-connected to `(seed_x, seed_y)` whose luminance is within
/// `tolerance` of the seed's. Diagonal steps let the background pass the
/// corners of one-pixel strokes.
pub fn flood_region(gray: &Grayscale, seed_x: u32, seed_y: u32, tolerance: f32) -> BinaryMask {
    let (w, h) = gray.dimensions();
    let seed = gray.get_pixel(seed_x, seed_y)[0];
    let mut region = BinaryMask::new(w, h);
    let mut queue = VecDeque::from([(seed_x, seed_y)]);
    region.set(seed_x, seed_y, true);

    while let Some((x, y)) = queue.pop_front() {
        for (nx, ny) in neighbors8(x, y, w, h) {
            if !region.get(nx, ny) && (gray.get_pixel(nx, ny)[0] - seed).abs() <= tolerance {
                region.set(nx, ny, true);
                queue.push_back((nx, ny));
            }
        }
    }
    region
}

impl FloodFillDetector {
    /// Union of the corner floods.
    pub fn background(&self, gray: &Grayscale) -> BinaryMask {
        let (w, h) = gray.dimensions();
        [(0, 0), (w - 1, 0), (0, h - 1), (w - 1, h - 1)]
            .into_iter()
            .fold(BinaryMask::new(w, h), |acc, (x, y)| {
                if acc.get(x, y) {
                    acc
                } else {
                    acc.union(&flood_region(gray, x, y, self.tolerance))
                }
            })
    }
}

impl IntruderDetector for FloodFillDetector {
    fn name(&self) -> &'static str {
        "flood_fill"
    }

    fn try_detect(&self, image: &RgbImage) -> Result<Detection> {
        validate_dimensions(image)?;
        let gray = to_grayscale(image);
        let (w, h) = gray.dimensions();

        let foreground = self.background(&gray).invert();
        if foreground.is_empty() {
            return Err(SanitizeError::EmptyContent(
                "flood fill reached every pixel".into(),
            ));
        }

        let (labels, num_components) = label_components(&foreground);
        let label_at = |x: u32, y: u32| labels.get_pixel(x, y)[0];

        let mut edge = BTreeSet::new();
        for x in 0..w {
            edge.extend([label_at(x, 0), label_at(x, h - 1)]);
        }
        for y in 0..h {
            edge.extend([label_at(0, y), label_at(w - 1, y)]);
        }
        edge.remove(&0);

        let mut center = BTreeSet::new();
        for y in h / 4..3 * h / 4 {
            for x in w / 4..3 * w / 4 {
                center.insert(label_at(x, y));
            }
        }

        let intruder_labels: Vec<u32> = edge.difference(&center).copied().collect();
        let intruder_mask =
            BinaryMask::from_fn(w, h, |x, y| intruder_labels.binary_search(&label_at(x, y)).is_ok());

        let mut left = None;
        let mut right = None;
        for (x, _) in intruder_mask.foreground() {
            if x < w / 3 {
                left = Some(left.map_or(x + 1, |l: u32| l.max(x + 1)));
            } else if x > 2 * w / 3 {
                right = Some(right.map_or(x, |r: u32| r.min(x)));
            }
        }
        debug!(num_components, intruders = ?intruder_labels, ?left, ?right, "flood fill");

        let diagnostics = Diagnostics::new(DiagnosticData::FloodFill(FloodFillDiagnostics {
            foreground_pixels: foreground.count(),
            num_components,
            intruder_labels,
            intruder_mask,
        }));
        Ok(Detection::new(
            w,
            h,
            IntruderRegion::from_boundaries(MaskBoundaries::columns(left, right)),
            diagnostics,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn canvas(w: u32, h: u32, ink: impl Fn(u32, u32) -> bool) -> RgbImage {
        RgbImage::from_fn(w, h, |x, y| {
            if ink(x, y) { Rgb([0, 0, 0]) } else { Rgb([255, 255, 255]) }
        })
    }

    fn intruder_mask(det: &Detection) -> &BinaryMask {
        match &det.diagnostics.data {
            DiagnosticData::FloodFill(d) => &d.intruder_mask,
            other => panic!("unexpected diagnostics {other:?}"),
        }
    }

    #[test]
    fn test_flood_region_respects_tolerance() {
        let gray = to_grayscale(&RgbImage::from_fn(10, 1, |x, _| {
            let v = (x * 10) as u8;
            Rgb([v, v, v])
        }));
        assert_eq!(flood_region(&gray, 0, 0, 30.5).count(), 4);
        assert_eq!(flood_region(&gray, 0, 0, 0.0).count(), 1);
    }

    #[test]
    fn test_background_flows_through_diagonal_gaps() {
        // 1-px diamond outline whose left tip sits on the border
        let img = canvas(40, 40, |x, y| x.abs_diff(4) + y.abs_diff(20) == 4);
        let detector = FloodFillDetector::default();
        let background = detector.background(&to_grayscale(&img));
        assert!(background.get(4, 20), "diamond interior should be background");

        // each outline pixel is its own 4-component; only the tip touches the edge
        let result = detector.detect(&img).unwrap();
        assert_eq!(result.boundaries(), MaskBoundaries::columns(Some(1), None));
        assert_eq!(intruder_mask(&result).count(), 1);
    }

    #[test]
    fn test_centered_blob_has_no_intruders() {
        let img = canvas(40, 40, |x, y| (12..28).contains(&x) && (10..30).contains(&y));
        let result = FloodFillDetector::default().detect(&img).unwrap();
        assert!(result.is_absent());
        assert!(intruder_mask(&result).is_empty());
    }

    #[test]
    fn test_edge_glyphs_become_boundaries() {
        let img = canvas(60, 40, |x, y| {
            let center = (20..40).contains(&x) && (10..30).contains(&y);
            let left = x < 6 && (12..28).contains(&y);
            let right = x >= 52 && (5..35).contains(&y);
            center || left || right
        });
        let result = FloodFillDetector::default().detect(&img).unwrap();
        let b = result.boundaries();
        assert_eq!(b.left, Some(6));
        assert_eq!(b.right, Some(52));
        assert_eq!(intruder_mask(&result).count(), 6 * 16 + 8 * 30);
    }

    #[test]
    fn test_edge_component_reaching_center_is_kept() {
        // a bar from the left edge into the centre is part of the glyph
        let img = canvas(40, 40, |x, y| x < 25 && (15..25).contains(&y));
        let result = FloodFillDetector::default().detect(&img).unwrap();
        assert!(result.is_absent());
    }

    #[test]
    fn test_uniform_image_is_empty() {
        let img = RgbImage::from_pixel(20, 20, Rgb([200, 200, 200]));
        let err = FloodFillDetector::default().try_detect(&img).unwrap_err();
        assert!(matches!(err, SanitizeError::EmptyContent(_)));
        assert!(FloodFillDetector::default().detect(&img).unwrap().is_absent());
    }
}
