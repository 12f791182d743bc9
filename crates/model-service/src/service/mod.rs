//! Model registry and prediction orchestration
//!
//! This module provides:
//! - The registry of configured models and the active-model switch
//! - The prediction pipeline (validate, infer, enrich)

mod orchestrator;
mod registry;


pub use orchestrator::{
    image_format, validate, PredictionConfig, PredictionService, DEFAULT_INFERENCE_TIMEOUT,
    UNKNOWN_FORMAT,
};
pub use registry::{ActiveModel, ModelRegistry};
