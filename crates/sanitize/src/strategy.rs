use image::RgbImage;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr, VariantNames};

use crate::{
    algorithms::{
        ColumnDensityDetector, ColumnValleyDetector, CombinedValleyDetector, ComponentDetector,
        FloodFillDetector, GradientEdgeDetector, RowValleyDetector,
    },
    error::Result,
    traits::IntruderDetector,
    types::Detection,
};

/// Every detection strategy with its parameters.
///
/// Serialized as `{"type": "<name>", "params": {...}}`; omitted fields in
/// `params` take their defaults.
#[derive(
    Debug, Clone,
    Serialize, Deserialize, JsonSchema,
    Display, EnumString, EnumIter, VariantNames, IntoStaticStr,
    PartialEq
)]
#[serde(tag = "type", content = "params", rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Strategy {
    /// Scan the raw column density inwards from each side
    ColumnDensity(ColumnDensityDetector),
    /// Valleys of the smoothed column density
    ColumnValley(ColumnValleyDetector),
    /// Valleys of the smoothed row density
    RowValley(RowValleyDetector),
    /// Column and row valleys together
    CombinedValley(CombinedValleyDetector),
    /// Score connected blobs and mask the intruding ones pixel by pixel
    ConnectedComponents(ComponentDetector),
    /// Flood the background from the corners
    FloodFill(FloodFillDetector),
    /// Strongest vertical edges near each side
    GradientEdge(GradientEdgeDetector),
}

impl Strategy {
    /// JSON schema for all strategies
    pub fn schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(Strategy)
    }

    pub fn strategy_names() -> &'static [&'static str] {
        <Self as VariantNames>::VARIANTS
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::ColumnDensity(_) => "Mask side columns separated from the glyph by a low-density gap",
            Self::ColumnValley(_) => "Mask side columns beyond deep valleys in the smoothed column profile",
            Self::RowValley(_) => "Mask top/bottom rows beyond deep valleys in the smoothed row profile",
            Self::CombinedValley(_) => "Column and row valley detection merged into one set of boundaries",
            Self::ConnectedComponents(_) => "Pixel-accurate mask of edge blobs that score poorly as the target glyph",
            Self::FloodFill(_) => "Mask edge regions not connected to the image centre after a background flood",
            Self::GradientEdge(_) => "Mask beyond the strongest vertical edges near each side",
        }
    }

    fn detector(&self) -> &dyn IntruderDetector {
        match self {
            Self::ColumnDensity(d) => d,
            Self::ColumnValley(d) => d,
            Self::RowValley(d) => d,
            Self::CombinedValley(d) => d,
            Self::ConnectedComponents(d) => d,
            Self::FloodFill(d) => d,
            Self::GradientEdge(d) => d,
        }
    }
}

impl IntruderDetector for Strategy {
    fn name(&self) -> &'static str {
        self.into()
    }

    fn try_detect(&self, image: &RgbImage) -> Result<Detection> {
        self.detector().try_detect(image)
    }

    fn detect(&self, image: &RgbImage) -> Result<Detection> {
        self.detector().detect(image)
    }
}
