use std::path::PathBuf;
use thiserror::Error;

/// The model catalog could not be loaded. Fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read model catalog {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse model catalog: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid model catalog: {0}")]
    Invalid(String),
}

/// The request was rejected before reaching a backend
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Unsupported image format: {0}")]
    UnsupportedFormat(String),

    #[error("Image too large. Max size: {max_kb}KB")]
    TooLarge { max_kb: u64 },
}

/// A backend failed to produce a classification
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InferenceError {
    #[error("Model backend unavailable: {0}")]
    Unavailable(String),

    #[error("Failed to decode image: {0}")]
    Decode(String),

    #[error("Inference failed: {0}")]
    Backend(String),

    #[error("Inference timed out after {0}ms")]
    Timeout(u64),

    #[error("Backend returned confidence {0} outside [0, 1]")]
    InvalidConfidence(f32),
}

/// Anything that turns a prediction request into a `PredictionError`
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PredictError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Inference(#[from] InferenceError),
}

impl PredictError {
    /// Label used for metrics and log fields
    pub fn kind(&self) -> &'static str {
        match self {
            PredictError::Validation(_) => "validation",
            PredictError::Inference(InferenceError::Timeout(_)) => "timeout",
            PredictError::Inference(_) => "inference",
        }
    }
}
