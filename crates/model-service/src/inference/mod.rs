//! Inference backends
//!
//! Every backend exposes the same capability: classify an image into one
//! of the model's class labels with a confidence in `[0, 1]`. The backend
//! is picked once per model by [`create_adapter`]; nothing downstream
//! inspects the backend kind again.

mod onnx;
mod preprocess;
mod simulated;

pub use onnx::OnnxClassifier;
pub use preprocess::{decode, probe_dimensions, to_tensor_data};
pub use simulated::{SimulatedBackend, DEFAULT_SIMULATED_LATENCY};

use crate::error::InferenceError;
use crate::models::{BackendKind, ModelDefinition};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Raw output of a backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Inference {
    pub class: String,
    pub confidence: f32,
}

/// Capability shared by every model backend
#[async_trait]
pub trait InferenceAdapter: Send + Sync {
    /// Classify the raw uploaded bytes; preprocessing is the backend's job
    async fn infer(&self, image: &[u8]) -> Result<Inference, InferenceError>;

    /// Short backend name for logs
    fn name(&self) -> &str;
}

/// Knobs for backends that are not described by the catalog
#[derive(Debug, Clone)]
pub struct AdapterOptions {
    /// Artificial delay of the simulated backend
    pub simulated_latency: Duration,
    /// Fixed seed for the simulated backend's random source
    pub seed: Option<u64>,
}

impl Default for AdapterOptions {
    fn default() -> Self {
        Self {
            simulated_latency: DEFAULT_SIMULATED_LATENCY,
            seed: None,
        }
    }
}

/// Build the backend for one catalog entry
pub fn create_adapter(
    definition: &ModelDefinition,
    options: &AdapterOptions,
) -> Result<Arc<dyn InferenceAdapter>, InferenceError> {
    match definition.kind {
        BackendKind::NeuralNet => Ok(Arc::new(OnnxClassifier::from_definition(definition)?)),
        BackendKind::ClassicalVision | BackendKind::Custom => {
            let backend = match options.seed {
                Some(seed) => SimulatedBackend::with_seed(
                    definition.classes.clone(),
                    definition.confidence_threshold,
                    options.simulated_latency,
                    seed,
                ),
                None => SimulatedBackend::new(
                    definition.classes.clone(),
                    definition.confidence_threshold,
                    options.simulated_latency,
                ),
            };
            Ok(Arc::new(backend))
        }
    }
}

/// Stand-in for a backend that failed to load; every call fails
#[derive(Debug, Clone)]
pub struct UnavailableBackend {
    cause: String,
}

impl UnavailableBackend {
    pub fn new(cause: impl Into<String>) -> Self {
        Self {
            cause: cause.into(),
        }
    }
}

#[async_trait]
impl InferenceAdapter for UnavailableBackend {
    async fn infer(&self, _image: &[u8]) -> Result<Inference, InferenceError> {
        Err(InferenceError::Unavailable(self.cause.clone()))
    }

    fn name(&self) -> &str {
        "unavailable"
    }
}
