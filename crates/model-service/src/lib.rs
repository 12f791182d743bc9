//! Model service library for plant photo identification
//!
//! This crate provides the core functionality for:
//! - Loading and validating the model catalog
//! - Species metadata lookup
//! - Inference backends (ONNX and simulated)
//! - Active model switching and the prediction pipeline
//! - Health checks and observability

pub mod catalog;
pub mod error;
pub mod health;
pub mod inference;
pub mod models;
pub mod observability;
pub mod service;
pub mod species;

use sha2::{Digest, Sha256};

pub use catalog::{CatalogStore, ModelCatalog, DEFAULT_CATALOG_PATH};
pub use error::{ConfigError, InferenceError, PredictError, ValidationError};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use inference::{create_adapter, AdapterOptions, Inference, InferenceAdapter};
pub use models::*;
pub use observability::{ServiceMetrics, StructuredLogger};
pub use service::{ActiveModel, ModelRegistry, PredictionConfig, PredictionService};
pub use species::SpeciesKnowledgeBase;

/// Hex-encoded SHA-256 of `data`
pub fn compute_checksum(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_checksum() {
        assert_eq!(
            compute_checksum(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(compute_checksum(b"").len(), 64);
    }
}
