//! Prediction orchestration
//!
//! A request moves through validation, inference and enrichment. Any
//! failure along the way is packaged as a `PredictionError`; callers
//! always get one of the two outcome shapes back.

use super::registry::{ActiveModel, ModelRegistry};
use crate::compute_checksum;
use crate::error::{InferenceError, PredictError, ValidationError};
use crate::inference::probe_dimensions;
use crate::models::{
    ImageInfo, LoggingConfig, ModelDefinition, ModelStats, PredictionError, PredictionOutcome,
    PredictionResult,
};
use crate::observability::{ServiceMetrics, StructuredLogger};
use crate::species::SpeciesKnowledgeBase;
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// Upper bound on a single backend call
pub const DEFAULT_INFERENCE_TIMEOUT: Duration = Duration::from_secs(5);

/// Format reported when a filename has no extension
pub const UNKNOWN_FORMAT: &str = "unknown";

#[derive(Debug, Clone)]
pub struct PredictionConfig {
    pub inference_timeout: Duration,
    pub logging: LoggingConfig,
}

impl Default for PredictionConfig {
    fn default() -> Self {
        Self {
            inference_timeout: DEFAULT_INFERENCE_TIMEOUT,
            logging: LoggingConfig::default(),
        }
    }
}

/// Request-handling core of the model service
pub struct PredictionService {
    registry: Arc<ModelRegistry>,
    species: Arc<SpeciesKnowledgeBase>,
    config: PredictionConfig,
    logger: StructuredLogger,
    metrics: ServiceMetrics,
}

impl PredictionService {
    pub fn new(
        registry: Arc<ModelRegistry>,
        species: Arc<SpeciesKnowledgeBase>,
        config: PredictionConfig,
    ) -> Self {
        let service = Self {
            registry,
            species,
            config,
            logger: StructuredLogger::new("model-service"),
            metrics: ServiceMetrics::new(),
        };
        service.publish_active_model();
        service
    }

    pub fn registry(&self) -> &Arc<ModelRegistry> {
        &self.registry
    }

    pub fn list_models(&self) -> BTreeMap<String, ModelDefinition> {
        self.registry.get_all_models()
    }

    pub fn get_stats(&self) -> ModelStats {
        self.registry.get_stats()
    }

    /// Switch the active model for subsequent requests
    pub fn switch_model(&self, key: &str) -> bool {
        let previous = self.registry.active_key();
        let switched = self.registry.switch_model(key);

        self.logger.log_model_switch(&previous, key, switched);
        if switched {
            self.metrics.inc_model_switches();
            self.publish_active_model();
        }
        switched
    }

    fn publish_active_model(&self) {
        let active = self.registry.active();
        self.metrics
            .set_active_model(&active.serving_key, &active.definition.version);
    }

    /// Classify one uploaded image
    pub async fn predict(&self, image: &[u8], filename: &str) -> PredictionOutcome {
        let started = Instant::now();
        let active = self.registry.active();
        let format = image_format(filename);

        let outcome = match self.run(&active, image, &format).await {
            Ok(result) => {
                self.metrics.inc_predictions();
                if self.config.logging.log_predictions {
                    self.logger.log_prediction(&result);
                }
                PredictionOutcome::Success(result)
            }
            Err(err) => PredictionOutcome::Failure(self.fail(&err, &active, image, format)),
        };

        self.metrics
            .observe_prediction_latency(started.elapsed().as_secs_f64());
        outcome
    }

    /// Reject an upload the transport stopped reading past its body limit
    ///
    /// `received` is the prefix that arrived. The format check still runs
    /// first, as in `validate`.
    pub fn reject_oversized(&self, filename: &str, received: &[u8]) -> PredictionError {
        let active = self.registry.active();
        let format = image_format(filename);
        let err = if active.definition.supports_format(&format) {
            ValidationError::TooLarge {
                max_kb: active.definition.max_image_size,
            }
        } else {
            ValidationError::UnsupportedFormat(format.clone())
        };
        self.fail(&err.into(), &active, received, format)
    }

    fn fail(
        &self,
        err: &PredictError,
        active: &ActiveModel,
        image: &[u8],
        format: String,
    ) -> PredictionError {
        let failure = failure(err, &active.key, image, format);
        self.metrics.inc_prediction_errors(err.kind());
        if self.config.logging.log_errors {
            self.logger.log_prediction_error(&failure, err.kind());
        }
        failure
    }

    async fn run(
        &self,
        active: &ActiveModel,
        image: &[u8],
        format: &str,
    ) -> Result<PredictionResult, PredictError> {
        validate(&active.definition, image, format)?;

        let start = Instant::now();
        let inference = self.infer(active, image).await?;
        if !inference.confidence.is_finite() || !(0.0..=1.0).contains(&inference.confidence) {
            return Err(InferenceError::InvalidConfidence(inference.confidence).into());
        }

        let elapsed = start.elapsed();
        self.metrics.observe_inference_latency(elapsed.as_secs_f64());

        let species_info = self.species.lookup(&inference.class);

        Ok(PredictionResult {
            class: inference.class,
            confidence: inference.confidence,
            species_info,
            processing_time: elapsed.as_millis() as u64,
            model_used: active.key.clone(),
            timestamp: Utc::now(),
            image_digest: compute_checksum(image),
        })
    }

    /// Call the backend on its own task, bounded by the timeout
    ///
    /// A panicking backend surfaces as an inference error rather than
    /// unwinding through the caller.
    async fn infer(
        &self,
        active: &ActiveModel,
        image: &[u8],
    ) -> Result<crate::inference::Inference, InferenceError> {
        let adapter = Arc::clone(&active.adapter);
        let payload = image.to_vec();
        let mut task = tokio::spawn(async move { adapter.infer(&payload).await });

        match tokio::time::timeout(self.config.inference_timeout, &mut task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_error)) => Err(InferenceError::Backend(format!(
                "Inference task failed: {}",
                join_error
            ))),
            Err(_) => {
                task.abort();
                debug!(model = %active.serving_key, "Inference task aborted after timeout");
                Err(InferenceError::Timeout(
                    self.config.inference_timeout.as_millis() as u64,
                ))
            }
        }
    }
}

/// Lower-cased extension of `filename`, or `"unknown"`
pub fn image_format(filename: &str) -> String {
    match filename.rsplit_once('.') {
        Some((_, extension)) if !extension.is_empty() => extension.to_lowercase(),
        _ => UNKNOWN_FORMAT.to_string(),
    }
}

/// Reject payloads the model cannot accept
pub fn validate(
    definition: &ModelDefinition,
    image: &[u8],
    format: &str,
) -> Result<(), ValidationError> {
    if !definition.supports_format(format) {
        return Err(ValidationError::UnsupportedFormat(format.to_string()));
    }

    if image.len() as u64 > definition.max_image_bytes() {
        return Err(ValidationError::TooLarge {
            max_kb: definition.max_image_size,
        });
    }

    Ok(())
}

fn failure(err: &PredictError, model: &str, image: &[u8], format: String) -> PredictionError {
    let dimensions = probe_dimensions(image)
        .map(|(width, height)| [width, height])
        .unwrap_or([0, 0]);

    PredictionError {
        error: err.to_string(),
        model: model.to_string(),
        timestamp: Utc::now(),
        image_info: ImageInfo {
            size: image.len(),
            format,
            dimensions,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_format() {
        assert_eq!(image_format("leaf.JPG"), "jpg");
        assert_eq!(image_format("archive.tar.png"), "png");
        assert_eq!(image_format("noextension"), UNKNOWN_FORMAT);
        assert_eq!(image_format("trailing."), UNKNOWN_FORMAT);
        assert_eq!(image_format(""), UNKNOWN_FORMAT);
    }
}
