//! Observability infrastructure for the model service
//!
//! Provides:
//! - Prometheus metrics (prediction outcomes, latency, active model)
//! - Structured JSON logging with tracing

use crate::models::{PredictionError, PredictionResult};
use prometheus::{
    register_gauge_vec, register_histogram, register_int_counter, register_int_counter_vec,
    GaugeVec, Histogram, IntCounter, IntCounterVec,
};
use std::sync::OnceLock;
use tracing::{debug, info, warn};

/// Histogram buckets for request latency (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<ServiceMetricsInner> = OnceLock::new();

struct ServiceMetricsInner {
    prediction_latency_seconds: Histogram,
    inference_latency_seconds: Histogram,
    predictions_total: IntCounter,
    prediction_errors_total: IntCounterVec,
    model_switches_total: IntCounter,
    active_model_info: GaugeVec,
}

impl ServiceMetricsInner {
    fn new() -> Self {
        Self {
            prediction_latency_seconds: register_histogram!(
                "flora_prediction_latency_seconds",
                "End-to-end time spent handling a prediction request",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register prediction_latency_seconds"),

            inference_latency_seconds: register_histogram!(
                "flora_inference_latency_seconds",
                "Time spent inside the model backend",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register inference_latency_seconds"),

            predictions_total: register_int_counter!(
                "flora_predictions_total",
                "Total number of successful predictions"
            )
            .expect("Failed to register predictions_total"),

            prediction_errors_total: register_int_counter_vec!(
                "flora_prediction_errors_total",
                "Total number of failed predictions by failure kind",
                &["kind"]
            )
            .expect("Failed to register prediction_errors_total"),

            model_switches_total: register_int_counter!(
                "flora_model_switches_total",
                "Total number of active model switches"
            )
            .expect("Failed to register model_switches_total"),

            active_model_info: register_gauge_vec!(
                "flora_active_model_info",
                "Information about the model currently serving predictions",
                &["model", "version"]
            )
            .expect("Failed to register active_model_info"),
        }
    }
}

/// Handle to the process-wide Prometheus metrics
///
/// Clones share the same underlying metrics.
#[derive(Clone)]
pub struct ServiceMetrics {
    _private: (),
}

impl Default for ServiceMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(ServiceMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &ServiceMetricsInner {
        GLOBAL_METRICS.get_or_init(ServiceMetricsInner::new)
    }

    pub fn observe_prediction_latency(&self, duration_secs: f64) {
        self.inner().prediction_latency_seconds.observe(duration_secs);
    }

    pub fn observe_inference_latency(&self, duration_secs: f64) {
        self.inner().inference_latency_seconds.observe(duration_secs);
    }

    pub fn inc_predictions(&self) {
        self.inner().predictions_total.inc();
    }

    pub fn inc_prediction_errors(&self, kind: &str) {
        self.inner()
            .prediction_errors_total
            .with_label_values(&[kind])
            .inc();
    }

    pub fn inc_model_switches(&self) {
        self.inner().model_switches_total.inc();
    }

    /// Publish the model now serving predictions
    pub fn set_active_model(&self, model: &str, version: &str) {
        self.inner().active_model_info.reset();
        self.inner()
            .active_model_info
            .with_label_values(&[model, version])
            .set(1.0);
    }
}

/// Structured logger for service events
///
/// Every event carries an `event` field so log pipelines can filter
/// without parsing messages.
#[derive(Clone)]
pub struct StructuredLogger {
    service: String,
}

impl StructuredLogger {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    pub fn log_startup(&self, version: &str, active_model: &str, model_count: usize) {
        info!(
            event = "service_started",
            service = %self.service,
            service_version = %version,
            active_model = %active_model,
            model_count = model_count,
            "Model service started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "service_shutdown",
            service = %self.service,
            reason = %reason,
            "Model service shutting down"
        );
    }

    pub fn log_catalog_loaded(&self, path: &str, active_model: &str, fallback_model: &str, models: &[&str]) {
        debug!(
            event = "catalog_loaded",
            service = %self.service,
            path = %path,
            active_model = %active_model,
            fallback_model = %fallback_model,
            models = ?models,
            "Model catalog loaded"
        );
    }

    pub fn log_prediction(&self, result: &PredictionResult) {
        info!(
            event = "prediction_completed",
            service = %self.service,
            class = %result.class,
            confidence = result.confidence,
            common_name = %result.species_info.common_name,
            processing_time_ms = result.processing_time,
            model_used = %result.model_used,
            image_digest = %result.image_digest,
            "Prediction completed"
        );
    }

    pub fn log_prediction_error(&self, failure: &PredictionError, kind: &str) {
        warn!(
            event = "prediction_failed",
            service = %self.service,
            kind = %kind,
            error = %failure.error,
            model = %failure.model,
            image_size = failure.image_info.size,
            image_format = %failure.image_info.format,
            width = failure.image_info.dimensions[0],
            height = failure.image_info.dimensions[1],
            "Prediction failed"
        );
    }

    pub fn log_model_switch(&self, old_model: &str, new_model: &str, success: bool) {
        if success {
            info!(
                event = "model_switched",
                service = %self.service,
                old_model = %old_model,
                new_model = %new_model,
                "Active model switched"
            );
        } else {
            warn!(
                event = "model_switch_rejected",
                service = %self.service,
                active_model = %old_model,
                requested_model = %new_model,
                "Requested model not in catalog, keeping active model"
            );
        }
    }

    pub fn log_backend_unavailable(&self, model: &str, cause: &str) {
        warn!(
            event = "backend_unavailable",
            service = %self.service,
            model = %model,
            cause = %cause,
            "Model backend failed to load, requests to it will fail"
        );
    }
}
