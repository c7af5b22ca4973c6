use serde::{Deserialize, Serialize};

use crate::{
    algorithms::{
        components::ComponentDiagnostics,
        flood_fill::FloodFillDiagnostics,
        gradient::GradientDiagnostics,
        valley::{DensityDiagnostics, ProjectionDiagnostics},
    },
    binary::BinaryMask,
};

/// Rectangular mask edges, all exclusive of the kept region.
///
/// `left = Some(n)` masks columns `0..n`, `right = Some(n)` masks columns
/// `n..width`; `top`/`bottom` do the same for rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaskBoundaries {
    pub left: Option<u32>,
    pub right: Option<u32>,
    pub top: Option<u32>,
    pub bottom: Option<u32>,
}

impl MaskBoundaries {
    pub fn columns(left: Option<u32>, right: Option<u32>) -> Self {
        Self {
            left,
            right,
            ..Self::default()
        }
    }

    pub fn rows(top: Option<u32>, bottom: Option<u32>) -> Self {
        Self {
            top,
            bottom,
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.left.is_none() && self.right.is_none() && self.top.is_none() && self.bottom.is_none()
    }

    /// Take every side that is set in either value; `other` wins on conflicts.
    pub fn merge(self, other: Self) -> Self {
        Self {
            left: other.left.or(self.left),
            right: other.right.or(self.right),
            top: other.top.or(self.top),
            bottom: other.bottom.or(self.bottom),
        }
    }

    pub fn covers(&self, x: u32, y: u32) -> bool {
        self.left.is_some_and(|l| x < l)
            || self.right.is_some_and(|r| x >= r)
            || self.top.is_some_and(|t| y < t)
            || self.bottom.is_some_and(|b| y >= b)
    }
}

/// What a strategy decided to mask.
#[derive(Debug, Clone, PartialEq)]
pub enum IntruderRegion {
    /// No intrusion found.
    None,
    Boundaries(MaskBoundaries),
    /// Pixel-accurate intruder mask (connected-component strategy).
    Pixels(BinaryMask),
}

impl IntruderRegion {
    /// Collapse empty boundaries and empty masks to `None`.
    pub fn from_boundaries(boundaries: MaskBoundaries) -> Self {
        if boundaries.is_empty() {
            Self::None
        } else {
            Self::Boundaries(boundaries)
        }
    }

    pub fn from_mask(mask: BinaryMask) -> Self {
        if mask.is_empty() { Self::None } else { Self::Pixels(mask) }
    }
}

/// Per-call auxiliary data for renderers. Not part of the detection contract.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Diagnostics {
    pub message: Option<String>,
    pub data: DiagnosticData,
}

impl Diagnostics {
    pub fn new(data: DiagnosticData) -> Self {
        Self {
            message: None,
            data,
        }
    }

    pub fn message(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            data: DiagnosticData::None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DiagnosticData {
    #[default]
    None,
    Density(DensityDiagnostics),
    Projection(ProjectionDiagnostics),
    Combined {
        column: Box<Diagnostics>,
        row: Box<Diagnostics>,
    },
    Components(ComponentDiagnostics),
    FloodFill(FloodFillDiagnostics),
    Gradient(GradientDiagnostics),
}

/// Outcome of one strategy on one image.
#[derive(Debug, Clone)]
pub struct Detection {
    pub width: u32,
    pub height: u32,
    pub region: IntruderRegion,
    pub diagnostics: Diagnostics,
}

impl Detection {
    pub fn new(width: u32, height: u32, region: IntruderRegion, diagnostics: Diagnostics) -> Self {
        Self {
            width,
            height,
            region,
            diagnostics,
        }
    }

    /// A "nothing to mask" result explained by `message`.
    pub fn absent(width: u32, height: u32, message: impl Into<String>) -> Self {
        Self::new(width, height, IntruderRegion::None, Diagnostics::message(message))
    }

    pub fn is_absent(&self) -> bool {
        matches!(self.region, IntruderRegion::None)
    }

    pub fn boundaries(&self) -> MaskBoundaries {
        match &self.region {
            IntruderRegion::Boundaries(b) => *b,
            _ => MaskBoundaries::default(),
        }
    }

    pub fn pixel_mask(&self) -> Option<&BinaryMask> {
        match &self.region {
            IntruderRegion::Pixels(mask) => Some(mask),
            _ => None,
        }
    }

    /// Rasterize the region at the image's full size.
    pub fn to_mask(&self) -> BinaryMask {
        match &self.region {
            IntruderRegion::None => BinaryMask::new(self.width, self.height),
            IntruderRegion::Boundaries(b) => {
                BinaryMask::from_fn(self.width, self.height, |x, y| b.covers(x, y))
            }
            IntruderRegion::Pixels(mask) => mask.clone(),
        }
    }
}
