use std::{fs::File, io::BufWriter, path::Path};

use serde::Serialize;

use crate::{
    error::Result,
    pipeline::StrategyOutcome,
    types::{Detection, Diagnostics, IntruderRegion, MaskBoundaries},
};

/// JSON-friendly summary of one strategy's result on one image.
#[derive(Debug, Clone, Serialize)]
pub struct DetectionReport {
    pub strategy: String,
    pub width: u32,
    pub height: u32,
    /// `rectangle`, `pixels` or `none`.
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub boundaries: Option<MaskBoundaries>,
    pub masked_pixels: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<Diagnostics>,
}

impl DetectionReport {
    pub fn new(strategy: impl Into<String>, detection: &Detection) -> Self {
        let (kind, boundaries) = match &detection.region {
            IntruderRegion::None => ("none", None),
            IntruderRegion::Boundaries(b) => ("rectangle", Some(*b)),
            IntruderRegion::Pixels(_) => ("pixels", None),
        };
        Self {
            strategy: strategy.into(),
            width: detection.width,
            height: detection.height,
            kind,
            boundaries,
            masked_pixels: detection.to_mask().count(),
            message: detection.diagnostics.message.clone(),
            error: None,
            diagnostics: Some(detection.diagnostics.clone()),
        }
    }

    /// Report for a pipeline outcome on a `width`×`height` image, including
    /// failed strategies.
    pub fn from_outcome(outcome: &StrategyOutcome, width: u32, height: u32) -> Self {
        match &outcome.result {
            Ok(detection) => Self::new(outcome.strategy, detection),
            Err(error) => Self {
                strategy: outcome.strategy.to_string(),
                width,
                height,
                kind: "none",
                boundaries: None,
                masked_pixels: 0,
                message: None,
                error: Some(error.clone()),
                diagnostics: None,
            },
        }
    }

    /// Drop the per-strategy diagnostic bundle.
    pub fn without_diagnostics(mut self) -> Self {
        self.diagnostics = None;
        self
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }
}
