pub mod builder;

use image::RgbImage;
use tracing::{info, warn};

use crate::{
    error::Result,
    cleanup::sanitize_image,
    strategy::Strategy,
    traits::IntruderDetector,
    types::Detection,
};

/// Result of one strategy inside a pipeline run.
#[derive(Debug)]
pub struct StrategyOutcome {
    pub strategy: &'static str,
    pub result: std::result::Result<Detection, String>,
}

impl StrategyOutcome {
    pub fn detection(&self) -> Option<&Detection> {
        self.result.as_ref().ok()
    }
}

/// Runs several strategies over the same image, each on its own.
pub struct Pipeline {
    strategies: Vec<Box<dyn IntruderDetector>>,
}

impl Pipeline {
    /// Create a new pipeline builder
    pub fn builder() -> builder::PipelineBuilder {
        builder::PipelineBuilder::new()
    }

    pub fn new(strategies: Vec<Box<dyn IntruderDetector>>) -> Self {
        Self { strategies }
    }

    /// Every strategy with its default parameters.
    pub fn all_defaults() -> Self {
        Self::builder().with_all_strategies().build()
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Run every strategy. A strategy that fails is recorded with its error
    /// and does not stop the others.
    pub fn process(&self, image: &RgbImage) -> Vec<StrategyOutcome> {
        self.strategies
            .iter()
            .map(|strategy| {
                let result = strategy.detect(image).map_err(|e| e.to_string());
                match &result {
                    Ok(det) => info!(
                        strategy = strategy.name(),
                        masked = det.to_mask().count(),
                        message = det.diagnostics.message.as_deref().unwrap_or(""),
                        "strategy finished"
                    ),
                    Err(e) => warn!(strategy = strategy.name(), "strategy failed: {e}"),
                }
                StrategyOutcome {
                    strategy: strategy.name(),
                    result,
                }
            })
            .collect()
    }

    /// Run a single named strategy and return the sanitized image.
    pub fn sanitize_with(strategy: &Strategy, image: &RgbImage) -> Result<RgbImage> {
        let detection = strategy.detect(image)?;
        Ok(sanitize_image(image, &detection))
    }

    /// Get information about the pipeline configuration
    pub fn info(&self) -> String {
        format!("Pipeline: {} strategies ({})", self.len(), self.names().join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::{ColumnDensityDetector, FloodFillDetector};
    use image::Rgb;

    #[test]
    fn test_failures_do_not_abort_the_run() {
        let pipeline = Pipeline::builder()
            .add_strategy(ColumnDensityDetector::default())
            .add_strategy(FloodFillDetector::default())
            .build();
        assert_eq!(pipeline.len(), 2);

        // too small for every strategy
        let tiny = RgbImage::from_pixel(4, 4, Rgb([255, 255, 255]));
        let outcomes = pipeline.process(&tiny);
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes.iter().all(|o| o.result.is_err()));

        let blank = RgbImage::from_pixel(20, 20, Rgb([255, 255, 255]));
        let outcomes = pipeline.process(&blank);
        assert!(outcomes.iter().all(|o| o.detection().is_some_and(Detection::is_absent)));
        assert_eq!(outcomes[1].strategy, "flood_fill");
    }

    #[test]
    fn test_all_defaults_covers_every_strategy() {
        let pipeline = Pipeline::all_defaults();
        assert_eq!(pipeline.names(), Strategy::strategy_names());
    }

    #[test]
    fn test_sanitize_with_blanks_intruder() {
        let img = RgbImage::from_fn(100, 100, |x, y| {
            let center = (18..82).contains(&x) && (19..81).contains(&y);
            let left = x < 10 && (25..75).contains(&y);
            if center || left { Rgb([0, 0, 0]) } else { Rgb([255, 255, 255]) }
        });
        let strategy = Strategy::ConnectedComponents(Default::default());
        let clean = Pipeline::sanitize_with(&strategy, &img).unwrap();
        assert_eq!(clean.get_pixel(5, 50), &Rgb([255, 255, 255]));
        assert_eq!(clean.get_pixel(50, 50), &Rgb([0, 0, 0]));
    }
}
