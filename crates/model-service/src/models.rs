//! Core data models for the model service

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Backend family a model is executed with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendKind {
    /// Classical computer-vision pipeline
    #[serde(alias = "opencv")]
    ClassicalVision,
    /// Trained network exported to ONNX
    #[serde(alias = "tensorflow", alias = "pytorch", alias = "onnx")]
    NeuralNet,
    Custom,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            BackendKind::ClassicalVision => "classical-vision",
            BackendKind::NeuralNet => "neural-net",
            BackendKind::Custom => "custom",
        };
        f.write_str(label)
    }
}

/// Image preprocessing applied by a backend before inference
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreprocessingConfig {
    /// Target `[width, height]`
    pub resize: [u32; 2],
    /// Scale pixels to `[-1, 1]` instead of `[0, 1]`
    #[serde(default)]
    pub normalize: bool,
    /// Training-time augmentation, ignored at inference
    #[serde(default)]
    pub augmentation: bool,
}

/// A classification model declared in the catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDefinition {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: BackendKind,
    pub version: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "modelPath", alias = "model_path")]
    pub model_path: PathBuf,
    pub confidence_threshold: f32,
    /// Lower-cased file extensions
    pub supported_formats: Vec<String>,
    /// Maximum payload size in kilobytes
    pub max_image_size: u64,
    pub preprocessing: PreprocessingConfig,
    pub classes: Vec<String>,
    /// Hex SHA-256 of the model file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
}

impl ModelDefinition {
    pub fn supports_format(&self, format: &str) -> bool {
        self.supported_formats.iter().any(|f| f == format)
    }

    /// Maximum payload size in bytes
    pub fn max_image_bytes(&self) -> u64 {
        self.max_image_size.saturating_mul(1024)
    }
}

/// Verbosity of the operational log
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Logging preferences from the catalog document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub level: LogLevel,
    #[serde(default = "default_true")]
    pub log_predictions: bool,
    #[serde(default = "default_true")]
    pub log_errors: bool,
}

fn default_true() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            log_predictions: true,
            log_errors: true,
        }
    }
}

/// Descriptive metadata for a plant species
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeciesRecord {
    pub scientific_name: String,
    pub common_name: String,
    pub family: String,
    pub habitat: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conservation_status: Option<String>,
}

impl SpeciesRecord {
    pub fn conservation_status_or_unknown(&self) -> &str {
        self.conservation_status.as_deref().unwrap_or("Unknown")
    }
}

/// Successful classification of one image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub class: String,
    pub confidence: f32,
    pub species_info: SpeciesRecord,
    /// Inference duration in milliseconds
    pub processing_time: u64,
    pub model_used: String,
    pub timestamp: DateTime<Utc>,
    /// Hex SHA-256 of the uploaded bytes
    pub image_digest: String,
}

/// Best-effort diagnostics about a rejected image
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageInfo {
    pub size: usize,
    pub format: String,
    /// `[width, height]`, zeroed when the header could not be read
    pub dimensions: [u32; 2],
}

/// Failed classification of one image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionError {
    pub error: String,
    pub model: String,
    pub timestamp: DateTime<Utc>,
    pub image_info: ImageInfo,
}

/// Either shape returned by a prediction request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PredictionOutcome {
    Success(PredictionResult),
    Failure(PredictionError),
}

impl PredictionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, PredictionOutcome::Success(_))
    }

    pub fn into_result(self) -> Result<PredictionResult, PredictionError> {
        match self {
            PredictionOutcome::Success(result) => Ok(result),
            PredictionOutcome::Failure(error) => Err(error),
        }
    }
}

/// Registry statistics for the administrative surface
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelStats {
    pub active_model: String,
    pub available_models: usize,
    pub total_classes: usize,
    pub confidence_threshold: f32,
    pub fallback_model: String,
    pub enable_ensemble: bool,
}
