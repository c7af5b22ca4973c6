use strum::IntoEnumIterator;

use crate::{pipeline::Pipeline, strategy::Strategy, traits::IntruderDetector};

/// Builder for creating processing pipelines with a fluent API
#[derive(Default)]
pub struct PipelineBuilder {
    strategies: Vec<Box<dyn IntruderDetector>>,
}

impl PipelineBuilder {
    /// Create a new pipeline builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a strategy to the pipeline
    pub fn add_strategy<D>(mut self, detector: D) -> Self
    where
        D: IntruderDetector + 'static,
    {
        self.strategies.push(Box::new(detector));
        self
    }

    pub fn with_strategies(self, strategies: impl IntoIterator<Item = Strategy>) -> Self {
        strategies.into_iter().fold(self, Self::add_strategy)
    }

    /// Every strategy with default parameters, in declaration order.
    pub fn with_all_strategies(self) -> Self {
        self.with_strategies(Strategy::iter())
    }

    pub fn build(self) -> Pipeline {
        Pipeline::new(self.strategies)
    }
}
