//! Shape-based intruder detection.
//!
//! The crop is binarized, closed and hole-filled only to decide which ink
//! belongs together; each resulting blob keeps its true (unfilled) pixels.
//! Blobs are scored on how much they look like the target glyph, and the
//! low-scoring ones hanging off an edge are masked pixel by pixel.

use image::RgbImage;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};
use tracing::debug;

use crate::{
    algorithms::{
        morphology::{close_disk, dilate_disk, fill_holes, label_components},
        preprocessing::{foreground_mask, Thresholding},
    },
    binary::BinaryMask,
    error::Result,
    traits::IntruderDetector,
    types::{Detection, DiagnosticData, Diagnostics, IntruderRegion},
};

/// Radius of the disk used to bridge serif breaks before labelling.
const CLOSING_RADIUS: u32 = 3;
/// A blob whose bounding box comes this close to a border touches it.
const TOUCH_MARGIN: u32 = 3;
/// Width of the border strip used for the cut-off density test.
const CUT_OFF_MARGIN: u32 = 5;
/// Share of the border strip that must be ink for a blob to be cut off.
const CUT_OFF_DENSITY: f64 = 0.3;

const W_CENTER_X: f64 = 50.0;
const W_CENTER_Y: f64 = 30.0;
const W_AREA: f64 = 40.0;
const W_SPAN: f64 = 20.0;
const P_ONE_SIDE_X: f64 = 40.0;
const P_ONE_SIDE_Y: f64 = 20.0;
const P_CUT_OFF: f64 = 60.0;
const B_SPANS_X: f64 = 40.0;
const B_SPANS_Y: f64 = 30.0;

/// How eagerly non-main blobs are classified as intruders.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Sensitivity {
    /// Only cut-off blobs.
    Low,
    #[default]
    Medium,
    High,
}

impl Sensitivity {
    /// Blobs scoring below this share of the main blob are intruders.
    pub fn score_ratio(self) -> f64 {
        match self {
            Self::Low => 0.3,
            Self::Medium => 0.5,
            Self::High => 0.7,
        }
    }

    pub fn requires_cut_off(self) -> bool {
        self == Self::Low
    }

    /// Score below which a non-main blob is an intruder. Equals
    /// `score_ratio * main_score` for positive main scores and keeps rising
    /// with the ratio when the main score is zero or negative.
    pub fn score_cutoff(self, main_score: f64) -> f64 {
        main_score - (1.0 - self.score_ratio()) * main_score.abs()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EdgeFlags {
    pub left: bool,
    pub right: bool,
    pub top: bool,
    pub bottom: bool,
}

impl EdgeFlags {
    pub fn any(&self) -> bool {
        self.left || self.right || self.top || self.bottom
    }
}

/// Inclusive pixel bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BoundingBox {
    pub min_x: u32,
    pub min_y: u32,
    pub max_x: u32,
    pub max_y: u32,
}

impl BoundingBox {
    fn point(x: u32, y: u32) -> Self {
        Self {
            min_x: x,
            min_y: y,
            max_x: x,
            max_y: y,
        }
    }

    fn extend(&mut self, x: u32, y: u32) {
        self.min_x = self.min_x.min(x);
        self.min_y = self.min_y.min(y);
        self.max_x = self.max_x.max(x);
        self.max_y = self.max_y.max(y);
    }

    pub fn width(&self) -> u32 {
        self.max_x - self.min_x + 1
    }

    pub fn height(&self) -> u32 {
        self.max_y - self.min_y + 1
    }
}

/// One blob of ink.
#[derive(Debug, Clone, Serialize)]
pub struct Component {
    pub id: u32,
    /// True (unfilled) pixel count.
    pub area: usize,
    /// Bounds of the closed, filled region the blob was labelled from.
    pub bbox: BoundingBox,
    /// Mean `(x, y)` of the closed, filled region.
    pub centroid: (f64, f64),
    pub touches: EdgeFlags,
    pub cut_off: EdgeFlags,
    pub score: f64,
    #[serde(skip)]
    pub mask: BinaryMask,
}

impl Component {
    pub fn is_cut_off(&self) -> bool {
        self.cut_off.any()
    }
}

#[derive(Debug, Clone, Copy)]
struct LabelStats {
    region_pixels: u64,
    sum_x: f64,
    sum_y: f64,
    bbox: Option<BoundingBox>,
    area: usize,
    /// True pixels inside the left, right, top and bottom border strips.
    strips: [usize; 4],
}

impl Default for LabelStats {
    fn default() -> Self {
        Self {
            region_pixels: 0,
            sum_x: 0.0,
            sum_y: 0.0,
            bbox: None,
            area: 0,
            strips: [0; 4],
        }
    }
}

/// Blobs of one image, best candidate for the target glyph first.
#[derive(Debug, Clone, Serialize)]
pub struct ComponentAnalysis {
    pub components: Vec<Component>,
    /// Labels found before the area filter.
    pub num_labels: u32,
}

impl ComponentAnalysis {
    /// The blob kept as the target glyph.
    pub fn main(&self) -> Option<&Component> {
        self.components.first()
    }

    /// Non-main blobs that touch an edge and are either cut off or, unless
    /// `sensitivity` demands a cut-off, score well below the main blob.
    pub fn intruders(&self, sensitivity: Sensitivity) -> Vec<&Component> {
        let Some(main) = self.main() else {
            return Vec::new();
        };
        let cutoff = sensitivity.score_cutoff(main.score);

        self.components[1..]
            .iter()
            .filter(|c| c.touches.any())
            .filter(|c| c.is_cut_off() || (!sensitivity.requires_cut_off() && c.score < cutoff))
            .collect()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ComponentDiagnostics {
    pub components: Vec<Component>,
    pub main: Option<u32>,
    pub intruders: Vec<u32>,
    pub num_labels: u32,
    pub dilation_px: u32,
    pub sensitivity: Sensitivity,
}

/// Connected-component detector producing a pixel-accurate intruder mask.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(default)]
pub struct ComponentDetector {
    /// Blobs smaller than this share of the image are noise.
    pub min_area_ratio: f64,
    /// Fixed dilation radius in pixels for the final mask.
    pub dilation: u32,
    /// Dilation as a percentage of `min(width, height)`; overrides `dilation`.
    pub dilation_percent: Option<f64>,
    /// Local instead of global thresholding.
    pub adaptive_threshold: bool,
    pub sensitivity: Sensitivity,
}

impl Default for ComponentDetector {
    fn default() -> Self {
        Self {
            min_area_ratio: 0.005,
            dilation: 0,
            dilation_percent: None,
            adaptive_threshold: false,
            sensitivity: Sensitivity::Medium,
        }
    }
}

impl ComponentDetector {
    pub fn with_sensitivity(mut self, sensitivity: Sensitivity) -> Self {
        self.sensitivity = sensitivity;
        self
    }

    pub fn with_dilation_percent(mut self, percent: f64) -> Self {
        self.dilation_percent = Some(percent);
        self
    }

    /// Radius actually used to grow the intruder mask.
    pub fn dilation_radius(&self, width: u32, height: u32) -> u32 {
        match self.dilation_percent {
            Some(percent) => (percent.max(0.0) / 100.0 * width.min(height) as f64).round() as u32,
            None => self.dilation,
        }
    }

    fn thresholding(&self) -> Thresholding {
        if self.adaptive_threshold {
            Thresholding::Adaptive
        } else {
            Thresholding::Global
        }
    }

    /// Label, measure and rank the blobs of `image`.
    pub fn analyze(&self, image: &RgbImage) -> Result<ComponentAnalysis> {
        let binary = foreground_mask(image, self.thresholding())?;
        let (w, h) = binary.dimensions();

        let connected = fill_holes(&close_disk(&binary, CLOSING_RADIUS));
        let (labels, num_labels) = label_components(&connected);

        let strip_x = CUT_OFF_MARGIN.min(w / 2);
        let strip_y = CUT_OFF_MARGIN.min(h / 2);
        let mut stats = vec![LabelStats::default(); num_labels as usize];
        for (x, y, label) in labels.enumerate_pixels() {
            let Some(s) = label[0].checked_sub(1).map(|i| &mut stats[i as usize]) else {
                continue;
            };
            s.region_pixels += 1;
            s.sum_x += x as f64;
            s.sum_y += y as f64;
            match s.bbox.as_mut() {
                Some(b) => b.extend(x, y),
                None => s.bbox = Some(BoundingBox::point(x, y)),
            }
            if binary.get(x, y) {
                s.area += 1;
                s.strips[0] += (x < strip_x) as usize;
                s.strips[1] += (x >= w - strip_x) as usize;
                s.strips[2] += (y < strip_y) as usize;
                s.strips[3] += (y >= h - strip_y) as usize;
            }
        }

        let total_area = (w as u64 * h as u64) as f64;
        let min_area = total_area * self.min_area_ratio;
        let mut components: Vec<Component> = stats
            .iter()
            .enumerate()
            .filter(|(_, s)| s.area as f64 >= min_area)
            .filter_map(|(i, s)| {
                let bbox = s.bbox?;
                let id = i as u32 + 1;
                let mask = BinaryMask::from_fn(w, h, |x, y| {
                    labels.get_pixel(x, y)[0] == id && binary.get(x, y)
                });
                Some(build_component(id, s, bbox, mask, (w, h), (strip_x, strip_y)))
            })
            .collect();

        components.sort_by(|a, b| b.score.total_cmp(&a.score));
        for c in &components {
            debug!(id = c.id, area = c.area, score = c.score, cut_off = c.is_cut_off(), "component");
        }

        Ok(ComponentAnalysis {
            components,
            num_labels,
        })
    }
}

fn build_component(
    id: u32,
    stats: &LabelStats,
    bbox: BoundingBox,
    mask: BinaryMask,
    (w, h): (u32, u32),
    (strip_x, strip_y): (u32, u32),
) -> Component {
    let margin_x = TOUCH_MARGIN.min(w / 2);
    let margin_y = TOUCH_MARGIN.min(h / 2);
    let touches = EdgeFlags {
        left: bbox.min_x <= margin_x,
        right: bbox.max_x >= w - 1 - margin_x,
        top: bbox.min_y <= margin_y,
        bottom: bbox.max_y >= h - 1 - margin_y,
    };

    let dense = |count: usize, strip: u32, span: u32| count as f64 > CUT_OFF_DENSITY * (strip * span) as f64;
    let cut_off = EdgeFlags {
        left: touches.left && dense(stats.strips[0], strip_x, bbox.height()),
        right: touches.right && dense(stats.strips[1], strip_x, bbox.height()),
        top: touches.top && dense(stats.strips[2], strip_y, bbox.width()),
        bottom: touches.bottom && dense(stats.strips[3], strip_y, bbox.width()),
    };

    let n = stats.region_pixels as f64;
    let centroid = (stats.sum_x / n, stats.sum_y / n);

    let mut component = Component {
        id,
        area: stats.area,
        bbox,
        centroid,
        touches,
        cut_off,
        score: 0.0,
        mask,
    };
    component.score = score(&component, w, h);
    component
}

/// Higher means more likely to be the target glyph.
pub fn score(c: &Component, width: u32, height: u32) -> f64 {
    let (w, h) = (width as f64, height as f64);
    let (cx, cy) = c.centroid;
    let mut score = 0.0;

    score += W_CENTER_X * (1.0 - (cx - w / 2.0).abs() / (w / 2.0));
    score += W_CENTER_Y * (1.0 - (cy - h / 2.0).abs() / (h / 2.0));
    score += W_AREA * c.area as f64 / (w * h);
    score += W_SPAN * c.bbox.width() as f64 / w;
    score += W_SPAN * c.bbox.height() as f64 / h;

    let t = c.touches;
    if t.left != t.right {
        score -= P_ONE_SIDE_X;
    }
    if t.top != t.bottom {
        score -= P_ONE_SIDE_Y;
    }
    if c.is_cut_off() {
        score -= P_CUT_OFF;
    }
    if t.left && t.right {
        score += B_SPANS_X;
    }
    if t.top && t.bottom {
        score += B_SPANS_Y;
    }
    score
}

impl IntruderDetector for ComponentDetector {
    fn name(&self) -> &'static str {
        "connected_components"
    }

    fn try_detect(&self, image: &RgbImage) -> Result<Detection> {
        let analysis = self.analyze(image)?;
        let (w, h) = image.dimensions();

        let main = analysis.main().map(|c| c.id);
        let intruders = analysis.intruders(self.sensitivity);
        let intruder_ids: Vec<u32> = intruders.iter().map(|c| c.id).collect();

        let (region, dilation_px, message) = if analysis.components.is_empty() {
            (IntruderRegion::None, 0, Some("No components found"))
        } else if intruders.is_empty() {
            (IntruderRegion::None, 0, None)
        } else {
            let union = intruders
                .iter()
                .fold(BinaryMask::new(w, h), |acc, c| acc.union(&c.mask));
            let radius = self.dilation_radius(w, h);
            (IntruderRegion::from_mask(dilate_disk(&union, radius)), radius, None)
        };
        debug!(?main, intruders = ?intruder_ids, dilation_px, "component classification");

        let mut diagnostics = Diagnostics::new(DiagnosticData::Components(ComponentDiagnostics {
            components: analysis.components,
            main,
            intruders: intruder_ids,
            num_labels: analysis.num_labels,
            dilation_px,
            sensitivity: self.sensitivity,
        }));
        if let Some(message) = message {
            diagnostics = diagnostics.with_message(message);
        }

        Ok(Detection::new(w, h, region, diagnostics))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;
    use strum::IntoEnumIterator;

    const INK: Rgb<u8> = Rgb([20, 20, 20]);
    const PAPER: Rgb<u8> = Rgb([250, 250, 250]);

    fn canvas(w: u32, h: u32, ink: impl Fn(u32, u32) -> bool) -> RgbImage {
        RgbImage::from_fn(w, h, |x, y| if ink(x, y) { INK } else { PAPER })
    }

    fn centered_with_left_intruder() -> RgbImage {
        canvas(100, 100, |x, y| {
            let center = (18..82).contains(&x) && (19..81).contains(&y);
            let left = x < 10 && (25..75).contains(&y);
            center || left
        })
    }

    fn diagnostics(det: &Detection) -> &ComponentDiagnostics {
        match &det.diagnostics.data {
            DiagnosticData::Components(d) => d,
            other => panic!("unexpected diagnostics {other:?}"),
        }
    }

    #[test]
    fn test_centered_blob_is_main_and_not_intruder() {
        let img = canvas(60, 60, |x, y| (20..40).contains(&x) && (15..45).contains(&y));
        let result = ComponentDetector::default().detect(&img).unwrap();
        assert!(result.is_absent());

        let diag = diagnostics(&result);
        assert_eq!(diag.components.len(), 1);
        assert_eq!(diag.main, Some(diag.components[0].id));
        assert!(!diag.components[0].touches.any());
    }

    #[test]
    fn test_left_intruder_mask_is_exact() {
        let img = centered_with_left_intruder();
        let result = ComponentDetector::default().detect(&img).unwrap();

        let diag = diagnostics(&result);
        let main = diag.components.iter().find(|c| Some(c.id) == diag.main).unwrap();
        assert!(main.centroid.0 > 45.0 && main.centroid.0 < 55.0);
        assert_eq!(diag.intruders.len(), 1);

        let expected = BinaryMask::from_fn(100, 100, |x, y| x < 10 && (25..75).contains(&y));
        assert_eq!(result.pixel_mask(), Some(&expected));
        assert_eq!(expected.count(), 500);
    }

    #[test]
    fn test_cut_off_flags() {
        let analysis = ComponentDetector::default()
            .analyze(&centered_with_left_intruder())
            .unwrap();
        let left = analysis.components.iter().find(|c| c.bbox.min_x == 0).unwrap();
        assert!(left.touches.left && !left.touches.right);
        assert!(left.cut_off.left);
        assert!(left.score < analysis.main().unwrap().score);
    }

    #[test]
    fn test_dilation_radius() {
        let fixed = ComponentDetector {
            dilation: 4,
            ..Default::default()
        };
        assert_eq!(fixed.dilation_radius(200, 100), 4);
        let relative = fixed.with_dilation_percent(3.0);
        assert_eq!(relative.dilation_radius(200, 100), 3);
        assert_eq!(relative.dilation_radius(300, 300), 9);
    }

    #[test]
    fn test_dilation_is_monotone() {
        let img = centered_with_left_intruder();
        let mut previous = 0;
        for percent in [0.0, 1.0, 2.0, 3.0, 5.0] {
            let det = ComponentDetector::default().with_dilation_percent(percent);
            let count = det.detect(&img).unwrap().to_mask().count();
            assert!(count >= previous, "{percent}% shrank the mask");
            previous = count;
        }
        assert!(previous > 500);
    }

    fn scored(id: u32, score: f64, touches_left: bool) -> Component {
        Component {
            id,
            area: 100,
            bbox: BoundingBox::point(0, 0),
            centroid: (0.0, 0.0),
            touches: EdgeFlags {
                left: touches_left,
                ..Default::default()
            },
            cut_off: EdgeFlags::default(),
            score,
            mask: BinaryMask::new(8, 8),
        }
    }

    #[test]
    fn test_score_cutoff() {
        assert!((Sensitivity::Medium.score_cutoff(100.0) - 50.0).abs() < 1e-9);
        assert!((Sensitivity::High.score_cutoff(100.0) - 70.0).abs() < 1e-9);
        assert!((Sensitivity::Low.score_cutoff(-10.0) - -17.0).abs() < 1e-9);
        assert!((Sensitivity::Medium.score_cutoff(-10.0) - -15.0).abs() < 1e-9);
        assert!((Sensitivity::High.score_cutoff(-10.0) - -13.0).abs() < 1e-9);
        assert_eq!(Sensitivity::Medium.score_cutoff(0.0), 0.0);
    }

    #[test]
    fn test_non_positive_main_score_stays_monotone() {
        let analysis = ComponentAnalysis {
            components: vec![
                scored(1, -10.0, false),
                scored(2, -12.0, true),
                scored(3, -14.0, true),
                scored(4, -30.0, true),
                // far below the main blob but off every edge
                scored(5, -50.0, false),
            ],
            num_labels: 5,
        };
        let ids = |s: Sensitivity| -> Vec<u32> { analysis.intruders(s).iter().map(|c| c.id).collect() };

        assert_eq!(ids(Sensitivity::Low), Vec::<u32>::new());
        assert_eq!(ids(Sensitivity::Medium), vec![4]);
        assert_eq!(ids(Sensitivity::High), vec![3, 4]);

        // a cut-off blob is an intruder at every sensitivity
        let mut with_cut = analysis.clone();
        with_cut.components[1].cut_off.left = true;
        for s in Sensitivity::iter() {
            assert!(with_cut.intruders(s).iter().any(|c| c.id == 2));
        }
    }

    #[test]
    fn test_sensitivity_is_monotone() {
        // main glyph, a cut-off sliver at the right edge and a faint, uncut
        // blob near the top edge
        let img = canvas(120, 100, |x, y| {
            let main = (35..85).contains(&x) && (20..85).contains(&y);
            let sliver = x >= 112 && (30..70).contains(&y);
            let dot = (8..20).contains(&x) && (2..10).contains(&y);
            main || sliver || dot
        });
        let analysis = ComponentDetector::default().analyze(&img).unwrap();
        let counts: Vec<usize> = Sensitivity::iter()
            .map(|s| analysis.intruders(s).len())
            .collect();
        assert!(counts[0] <= counts[1] && counts[1] <= counts[2], "{counts:?}");
        assert!(counts[0] >= 1);
    }

    #[test]
    fn test_noise_below_min_area_is_dropped() {
        let img = canvas(100, 100, |x, y| {
            let main = (30..70).contains(&x) && (20..80).contains(&y);
            let speck = x < 3 && (50..53).contains(&y);
            main || speck
        });
        let analysis = ComponentDetector::default().analyze(&img).unwrap();
        assert_eq!(analysis.components.len(), 1);
        assert_eq!(analysis.num_labels, 2);
    }

    #[test]
    fn test_holes_stay_in_true_mask() {
        // an "o": the counter is filled for labelling but not in the mask
        let img = canvas(60, 60, |x, y| {
            let dx = x as f64 - 30.0;
            let dy = y as f64 - 30.0;
            let r2 = dx * dx + dy * dy;
            (100.0..=400.0).contains(&r2)
        });
        let analysis = ComponentDetector::default().analyze(&img).unwrap();
        let main = analysis.main().unwrap();
        assert!(!main.mask.get(30, 30));
        assert!((main.centroid.0 - 30.0).abs() < 0.5);
    }

    #[test]
    fn test_blank_image_has_no_components() {
        let img = RgbImage::from_pixel(40, 40, PAPER);
        let result = ComponentDetector::default().detect(&img).unwrap();
        assert!(result.is_absent());
        assert!(result.diagnostics.message.is_some());
    }
}
