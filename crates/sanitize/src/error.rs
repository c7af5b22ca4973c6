use thiserror::Error;

#[derive(Error, Debug)]
pub enum SanitizeError {
    #[error("Image is {width}x{height}, strategies need at least {min}x{min}")]
    InvalidInput { width: u32, height: u32, min: u32 },

    #[error("No content detected: {0}")]
    EmptyContent(String),

    #[error("Algorithm fault: {0}")]
    AlgorithmFault(String),

    #[error("Failed to load image: {0}")]
    ImageLoad(#[from] image::ImageError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SanitizeError {
    /// Errors that mean "nothing to mask" for a single strategy rather than a
    /// rejected input. These never abort a batch.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::EmptyContent(_) | Self::AlgorithmFault(_))
    }
}

pub type Result<T> = std::result::Result<T, SanitizeError>;
