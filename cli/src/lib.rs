use std::{
    fs,
    path::{Path, PathBuf},
};

use sanitize::{
    io::load_rgb, sanitize_image, DetectionReport, Pipeline, SanitizeError, Strategy,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum RunConfigError {
    #[error(transparent)]
    SerdeError(#[from] serde_json::Error),
    #[error(transparent)]
    TomlDeError(#[from] toml::de::Error),
    #[error(transparent)]
    TomlSerError(#[from] toml::ser::Error),
    #[error(transparent)]
    IoError(#[from] std::io::Error),
    #[error(transparent)]
    Sanitize(#[from] SanitizeError),
    #[error("No images listed in the configuration")]
    NoImages,
    #[error("Unsupported file format. Please use .toml or .json files")]
    UnsupportedFileFormat,
}

/// Batch run over several glyph crops.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct RunConfig {
    pub images: Vec<PathBuf>,
    /// Where masks and sanitized images go; nothing is written when absent.
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
    /// Strategies to run; every strategy with defaults when empty.
    #[serde(default)]
    pub strategies: Vec<Strategy>,
}

impl RunConfig {
    /// Load RunConfig from TOML string
    pub fn from_toml(content: &str) -> Result<Self, RunConfigError> {
        Self::validated(toml::from_str(content)?)
    }

    /// Load RunConfig from JSON string
    pub fn from_json(content: &str) -> Result<Self, RunConfigError> {
        Self::validated(serde_json::from_str(content)?)
    }

    /// Auto-detect file format and load configuration
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, RunConfigError> {
        let path = path.as_ref();
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Self::from_toml(&fs::read_to_string(path)?),
            Some("json") => Self::from_json(&fs::read_to_string(path)?),
            _ => Err(RunConfigError::UnsupportedFileFormat),
        }
    }

    fn validated(config: Self) -> Result<Self, RunConfigError> {
        if config.images.is_empty() {
            return Err(RunConfigError::NoImages);
        }
        Ok(config)
    }

    /// Convert RunConfig to TOML string
    pub fn to_toml(&self) -> Result<String, RunConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Convert RunConfig to JSON string
    pub fn to_json(&self) -> Result<String, RunConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn pipeline(&self) -> Pipeline {
        build_pipeline(&self.strategies)
    }
}

/// Pipeline over `strategies`, or over every strategy when none are given.
pub fn build_pipeline(strategies: &[Strategy]) -> Pipeline {
    if strategies.is_empty() {
        Pipeline::all_defaults()
    } else {
        Pipeline::builder().with_strategies(strategies.iter().cloned()).build()
    }
}

/// Reports for every strategy run on one image.
#[derive(Debug, Clone, Serialize)]
pub struct ImageReport {
    pub image: PathBuf,
    pub results: Vec<DetectionReport>,
}

/// Run `pipeline` on the image at `path`. With an `output_dir`, writes
/// `<stem>_<strategy>_mask.png` and `<stem>_<strategy>_sanitized.png` for
/// every strategy that produced a detection.
pub fn process_image(
    path: &Path,
    pipeline: &Pipeline,
    output_dir: Option<&Path>,
) -> Result<ImageReport, RunConfigError> {
    let image = load_rgb(path)?;
    let (width, height) = image.dimensions();
    info!("Processing {:?} ({}x{}) with {}", path, width, height, pipeline.info());

    let outcomes = pipeline.process(&image);

    if let Some(dir) = output_dir {
        fs::create_dir_all(dir)?;
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string());
        for outcome in &outcomes {
            let Some(detection) = outcome.detection() else {
                continue;
            };
            let mask_path = dir.join(format!("{stem}_{}_mask.png", outcome.strategy));
            detection.to_mask().save(&mask_path)?;
            let clean_path = dir.join(format!("{stem}_{}_sanitized.png", outcome.strategy));
            sanitize_image(&image, detection)
                .save(&clean_path)
                .map_err(SanitizeError::from)?;
            info!("Wrote {:?} and {:?}", mask_path, clean_path);
        }
    }

    Ok(ImageReport {
        image: path.to_path_buf(),
        results: outcomes
            .iter()
            .map(|o| DetectionReport::from_outcome(o, width, height))
            .collect(),
    })
}
