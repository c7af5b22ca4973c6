pub mod preprocessing;
pub mod morphology;
pub mod profile;
pub mod valley;
pub mod components;
pub mod flood_fill;
pub mod gradient;

pub use preprocessing::{foreground_mask, Polarity, Thresholding};
pub use valley::{ColumnDensityDetector, ColumnValleyDetector, CombinedValleyDetector, RowValleyDetector};
pub use components::{ComponentAnalysis, ComponentDetector, Sensitivity};
pub use flood_fill::FloodFillDetector;
pub use gradient::GradientEdgeDetector;
