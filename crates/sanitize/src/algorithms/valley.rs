use image::RgbImage;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    algorithms::{
        preprocessing::{foreground_mask, Thresholding},
        profile::{self, PeakCriteria},
    },
    error::{Result, SanitizeError},
    traits::IntruderDetector,
    types::{Detection, DiagnosticData, Diagnostics, IntruderRegion, MaskBoundaries},
};

/// Share of the peak column density above which a column counts as ink.
const CONTENT_RATIO: f64 = 0.3;
/// Content above a row valley must exceed this share of the global maximum.
const ROW_MIN_CONTENT_RATIO: f64 = 0.1;
/// The dominant side of a row valley must be this much heavier.
const ROW_DOMINANCE: f64 = 1.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Axis {
    Columns,
    Rows,
}

#[derive(Debug, Clone, Serialize)]
pub struct DensityDiagnostics {
    pub column_density: Vec<u32>,
    pub max_density: u32,
    pub valley_threshold: f64,
    pub content_threshold: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProjectionDiagnostics {
    pub axis: Axis,
    pub profile: Vec<u32>,
    pub smoothed: Vec<f64>,
    pub valleys: Vec<usize>,
}

/// Column-density scan: content at an edge followed inward by a run of
/// near-empty columns marks that edge content as an intruder.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(default)]
pub struct ColumnDensityDetector {
    /// Width of the scanned band at each side, as a percentage of the width.
    pub edge_search_percent: f64,
    /// Columns at or below this share of the peak density are valley.
    pub valley_ratio: f64,
    /// Consecutive valley columns needed to accept a boundary.
    pub min_valley_width: usize,
}

impl Default for ColumnDensityDetector {
    fn default() -> Self {
        Self {
            edge_search_percent: 30.0,
            valley_ratio: 0.15,
            min_valley_width: 5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanDirection {
    FromLeft,
    FromRight,
}

impl ColumnDensityDetector {
    /// Boundaries for an already computed column density profile.
    pub fn boundaries_from_profile(&self, density: &[u32]) -> MaskBoundaries {
        MaskBoundaries::columns(
            self.scan(density, ScanDirection::FromLeft),
            self.scan(density, ScanDirection::FromRight),
        )
    }

    fn thresholds(&self, max_density: u32) -> (f64, f64) {
        let max = max_density as f64;
        (max * CONTENT_RATIO, max * self.valley_ratio)
    }

    fn scan(&self, density: &[u32], direction: ScanDirection) -> Option<u32> {
        let width = density.len();
        let max_density = density.iter().copied().max().unwrap_or(0);
        let (content_threshold, valley_threshold) = self.thresholds(max_density);
        let search = ((width as f64 * self.edge_search_percent / 100.0) as usize).min(width);
        let min_run = self.min_valley_width.max(1);

        let columns: Box<dyn Iterator<Item = usize>> = match direction {
            ScanDirection::FromLeft => Box::new(0..search),
            ScanDirection::FromRight => Box::new((width - search..width).rev()),
        };

        let mut saw_content = false;
        let mut run = 0usize;
        for x in columns {
            let d = density[x] as f64;
            if d > content_threshold {
                saw_content = true;
                run = 0;
            } else if d <= valley_threshold && saw_content {
                run += 1;
                if run >= min_run {
                    // the run starts next to the intruding content
                    let boundary = match direction {
                        ScanDirection::FromLeft => x + 1 - run,
                        ScanDirection::FromRight => x + run,
                    };
                    return Some(boundary as u32);
                }
            } else {
                run = 0;
            }
        }
        None
    }
}

impl IntruderDetector for ColumnDensityDetector {
    fn name(&self) -> &'static str {
        "column_density"
    }

    fn try_detect(&self, image: &RgbImage) -> Result<Detection> {
        let binary = foreground_mask(image, Thresholding::Global)?;
        let column_density = binary.column_profile();
        let max_density = column_density.iter().copied().max().unwrap_or(0);
        if max_density == 0 {
            return Err(SanitizeError::EmptyContent("column density is zero everywhere".into()));
        }

        let boundaries = self.boundaries_from_profile(&column_density);
        let (content_threshold, valley_threshold) = self.thresholds(max_density);
        debug!(max_density, ?boundaries, "column density scan");

        Ok(Detection::new(
            image.width(),
            image.height(),
            IntruderRegion::from_boundaries(boundaries),
            Diagnostics::new(DiagnosticData::Density(DensityDiagnostics {
                column_density,
                max_density,
                valley_threshold,
                content_threshold,
            })),
        ))
    }
}

/// Smoothed column projection; valleys in the outer thirds become the
/// left/right boundaries.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(default)]
pub struct ColumnValleyDetector {
    /// Moving-average window.
    pub smoothing: usize,
    /// Minimum valley prominence as a share of the smoothed maximum.
    pub valley_depth_ratio: f64,
}

impl Default for ColumnValleyDetector {
    fn default() -> Self {
        Self {
            smoothing: 5,
            valley_depth_ratio: 0.3,
        }
    }
}

impl ColumnValleyDetector {
    /// Valley candidates and the chosen boundaries for a smoothed profile.
    pub fn boundaries_from_profile(&self, smoothed: &[f64]) -> (Vec<usize>, MaskBoundaries) {
        let width = smoothed.len();
        let criteria = PeakCriteria {
            prominence: Some(profile::max_value(smoothed) * self.valley_depth_ratio),
            ..Default::default()
        };
        let valleys = profile::find_valleys(smoothed, &criteria);

        let left_third = width / 3;
        let right_two_thirds = 2 * width / 3;
        // innermost valley on each side
        let left = valleys.iter().rev().find(|&&v| v < left_third);
        let right = valleys.iter().find(|&&v| v > right_two_thirds);

        let boundaries = MaskBoundaries::columns(left.map(|&v| v as u32), right.map(|&v| v as u32));
        (valleys, boundaries)
    }
}

impl IntruderDetector for ColumnValleyDetector {
    fn name(&self) -> &'static str {
        "column_valley"
    }

    fn try_detect(&self, image: &RgbImage) -> Result<Detection> {
        let binary = foreground_mask(image, Thresholding::Global)?;
        let projection = binary.column_profile();
        let smoothed = profile::smooth(&profile::to_f64(&projection), self.smoothing);
        if profile::max_value(&smoothed) <= 0.0 {
            return Err(SanitizeError::EmptyContent("column projection is empty".into()));
        }

        let (valleys, boundaries) = self.boundaries_from_profile(&smoothed);
        debug!(?valleys, ?boundaries, "column valley search");

        Ok(Detection::new(
            image.width(),
            image.height(),
            IntruderRegion::from_boundaries(boundaries),
            Diagnostics::new(DiagnosticData::Projection(ProjectionDiagnostics {
                axis: Axis::Columns,
                profile: projection,
                smoothed,
                valleys,
            })),
        ))
    }
}

/// Smoothed row projection for ascenders/descenders poking in from above or
/// below. A valley near the top is accepted only when the glyph body below
/// it clearly outweighs the content above it, and vice versa at the bottom.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(default)]
pub struct RowValleyDetector {
    pub smoothing: usize,
    pub valley_depth_ratio: f64,
    /// Height of the band searched at top and bottom, in percent.
    pub edge_search_percent: f64,
    /// Minimum row separation between valley candidates.
    pub min_distance: usize,
}

impl Default for RowValleyDetector {
    fn default() -> Self {
        Self {
            smoothing: 5,
            valley_depth_ratio: 0.15,
            edge_search_percent: 40.0,
            min_distance: 10,
        }
    }
}

impl RowValleyDetector {
    /// Valley candidates and the accepted boundaries for a smoothed profile.
    pub fn boundaries_from_profile(&self, smoothed: &[f64]) -> (Vec<usize>, MaskBoundaries) {
        let height = smoothed.len();
        let max_density = profile::max_value(smoothed);
        let criteria = PeakCriteria {
            prominence: Some(max_density * self.valley_depth_ratio),
            distance: Some(self.min_distance),
            ..Default::default()
        };
        let valleys = profile::find_valleys(smoothed, &criteria);
        let band = (height as f64 * self.edge_search_percent / 100.0) as usize;

        let min_content = max_density * ROW_MIN_CONTENT_RATIO;
        let split = |r: usize| {
            (
                profile::max_value(&smoothed[..r]),
                profile::max_value(&smoothed[r..]),
            )
        };

        let top = deepest_valley(smoothed, valleys.iter().copied().filter(|&v| v < band)).filter(|&r| {
            let (above, below) = split(r);
            debug!(row = r, above, below, "top valley candidate");
            above > min_content && below > above * ROW_DOMINANCE
        });
        let bottom = deepest_valley(smoothed, valleys.iter().copied().filter(|&v| v > height.saturating_sub(band)))
            .filter(|&r| {
                let (above, below) = split(r);
                debug!(row = r, above, below, "bottom valley candidate");
                below > min_content && above > below * ROW_DOMINANCE
            });

        let boundaries = MaskBoundaries::rows(top.map(|r| r as u32), bottom.map(|r| r as u32));
        (valleys, boundaries)
    }
}

fn deepest_valley(smoothed: &[f64], candidates: impl Iterator<Item = usize>) -> Option<usize> {
    candidates.min_by(|&a, &b| smoothed[a].total_cmp(&smoothed[b]))
}

impl IntruderDetector for RowValleyDetector {
    fn name(&self) -> &'static str {
        "row_valley"
    }

    fn try_detect(&self, image: &RgbImage) -> Result<Detection> {
        let binary = foreground_mask(image, Thresholding::Global)?;
        let projection = binary.row_profile();
        let smoothed = profile::smooth(&profile::to_f64(&projection), self.smoothing);
        if profile::max_value(&smoothed) <= 0.0 {
            return Err(SanitizeError::EmptyContent("row projection is empty".into()));
        }

        let (valleys, boundaries) = self.boundaries_from_profile(&smoothed);
        debug!(?valleys, ?boundaries, "row valley search");

        Ok(Detection::new(
            image.width(),
            image.height(),
            IntruderRegion::from_boundaries(boundaries),
            Diagnostics::new(DiagnosticData::Projection(ProjectionDiagnostics {
                axis: Axis::Rows,
                profile: projection,
                smoothed,
                valleys,
            })),
        ))
    }
}

/// Column and row valley detectors run independently; all four boundaries
/// are reported together.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(default)]
pub struct CombinedValleyDetector {
    pub column: ColumnValleyDetector,
    pub row: RowValleyDetector,
}

impl CombinedValleyDetector {
    /// Both detectors with the same smoothing and depth ratio.
    pub fn uniform(smoothing: usize, valley_depth_ratio: f64) -> Self {
        Self {
            column: ColumnValleyDetector {
                smoothing,
                valley_depth_ratio,
            },
            row: RowValleyDetector {
                smoothing,
                valley_depth_ratio,
                ..RowValleyDetector::default()
            },
        }
    }
}

impl Default for CombinedValleyDetector {
    fn default() -> Self {
        Self::uniform(5, 0.2)
    }
}

impl IntruderDetector for CombinedValleyDetector {
    fn name(&self) -> &'static str {
        "combined_valley"
    }

    fn try_detect(&self, image: &RgbImage) -> Result<Detection> {
        let column = self.column.detect(image)?;
        let row = self.row.detect(image)?;
        let boundaries = column.boundaries().merge(row.boundaries());

        Ok(Detection::new(
            image.width(),
            image.height(),
            IntruderRegion::from_boundaries(boundaries),
            Diagnostics::new(DiagnosticData::Combined {
                column: Box::new(column.diagnostics),
                row: Box::new(row.diagnostics),
            }),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    const INK: Rgb<u8> = Rgb([0, 0, 0]);
    const PAPER: Rgb<u8> = Rgb([255, 255, 255]);

    /// Glyph body in the middle plus a sliver of a neighbour on the left.
    fn crop_with_left_intruder() -> RgbImage {
        RgbImage::from_fn(60, 40, |x, y| {
            let intruder = x < 4 && (5..35).contains(&y);
            let glyph = (20..40).contains(&x) && (5..35).contains(&y);
            if intruder || glyph { INK } else { PAPER }
        })
    }

    #[test]
    fn test_density_scan_finds_left_valley() {
        let det = ColumnDensityDetector::default();
        let result = det.detect(&crop_with_left_intruder()).unwrap();
        // intruder columns 0..4, valley starts at 4
        assert_eq!(result.boundaries(), MaskBoundaries::columns(Some(4), None));
    }

    #[test]
    fn test_density_scan_right_side_profile() {
        let det = ColumnDensityDetector {
            min_valley_width: 3,
            ..Default::default()
        };
        let mut density = vec![0u32; 20];
        density[8..12].fill(10);
        density[18..].fill(10);
        let b = det.boundaries_from_profile(&density);
        assert_eq!(b.right, Some(18));
        assert_eq!(b.left, None);
    }

    #[test]
    fn test_density_scan_ignores_leading_margin() {
        // empty margin, then content running past the search band: no valley after content
        let mut density = vec![0u32; 30];
        density[5..25].fill(10);
        let b = ColumnDensityDetector::default().boundaries_from_profile(&density);
        assert!(b.is_empty());
    }

    #[test]
    fn test_density_scan_is_deterministic() {
        let det = ColumnDensityDetector::default();
        let img = crop_with_left_intruder();
        let a = det.detect(&img).unwrap();
        let b = det.detect(&img).unwrap();
        assert_eq!(a.boundaries(), b.boundaries());
    }

    #[test]
    fn test_column_valley_on_profile() {
        let mut smoothed = vec![10.0; 30];
        smoothed[6] = 1.0;
        smoothed[25] = 2.0;
        smoothed[15] = 8.0;
        let (valleys, b) = ColumnValleyDetector::default().boundaries_from_profile(&smoothed);
        assert_eq!(valleys, vec![6, 25]);
        assert_eq!(b.left, Some(6));
        assert_eq!(b.right, Some(25));
    }

    fn row_profile(above: f64) -> Vec<f64> {
        let mut p = vec![50.0; 100];
        p[..10].fill(above);
        p[10..15].fill(0.0);
        p
    }

    #[test]
    fn test_row_valley_accepts_light_ascender() {
        let (_, b) = RowValleyDetector::default().boundaries_from_profile(&row_profile(20.0));
        assert_eq!(b.top, Some(12));
        assert_eq!(b.bottom, None);
    }

    #[test]
    fn test_row_valley_rejects_heavy_content_above() {
        let (valleys, b) = RowValleyDetector::default().boundaries_from_profile(&row_profile(40.0));
        assert_eq!(valleys, vec![12]);
        assert_eq!(b.top, None);
    }

    #[test]
    fn test_row_valley_bottom() {
        let mut p = vec![50.0; 100];
        p[85..90].fill(0.0);
        p[90..].fill(15.0);
        let (_, b) = RowValleyDetector::default().boundaries_from_profile(&p);
        assert_eq!(b.bottom, Some(87));
        assert_eq!(b.top, None);
    }

    #[test]
    fn test_combined_merges_sides() {
        let img = RgbImage::from_fn(90, 90, |x, y| {
            let glyph = (30..60).contains(&x) && (20..80).contains(&y);
            let left = x < 5 && (20..80).contains(&y);
            if glyph || left { INK } else { PAPER }
        });
        let result = CombinedValleyDetector::default().detect(&img).unwrap();
        let b = result.boundaries();
        assert!(b.left.is_some());
        assert!(matches!(result.diagnostics.data, DiagnosticData::Combined { .. }));
    }

    #[test]
    fn test_uniform_image_is_absent() {
        let img = RgbImage::from_pixel(20, 20, PAPER);
        for det in [
            &ColumnDensityDetector::default() as &dyn IntruderDetector,
            &ColumnValleyDetector::default(),
            &RowValleyDetector::default(),
            &CombinedValleyDetector::default(),
        ] {
            let result = det.detect(&img).unwrap();
            assert!(result.is_absent(), "{}", det.name());
            assert!(result.boundaries().is_empty());
        }
    }
}
