//! HTTP API for identification, model management, health checks and
//! Prometheus metrics

use axum::{
    extract::{
        multipart::MultipartError, rejection::JsonRejection, DefaultBodyLimit, Multipart, State,
    },
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use model_service::{
    health::{ComponentStatus, HealthRegistry},
    ModelDefinition, ModelStats, PredictionError, PredictionOutcome, PredictionResult,
    PredictionService,
};
use prometheus::{Encoder, TextEncoder};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use tracing::{info, warn};

/// Multipart field carrying the uploaded photo
const IMAGE_FIELD: &str = "image";

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<PredictionService>,
    pub health_registry: HealthRegistry,
    pub max_upload_bytes: usize,
}

impl AppState {
    pub fn new(
        service: Arc<PredictionService>,
        health_registry: HealthRegistry,
        max_upload_bytes: usize,
    ) -> Self {
        Self {
            service,
            health_registry,
            max_upload_bytes,
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorBody {
            error: message.into(),
        }),
    )
        .into_response()
}

#[derive(Debug, Serialize)]
struct IdentifySuccess {
    success: bool,
    prediction: PredictionResult,
}

#[derive(Debug, Serialize)]
struct IdentifyFailure {
    success: bool,
    #[serde(flatten)]
    failure: PredictionError,
}

#[derive(Debug, Serialize)]
struct ModelsResponse {
    models: BTreeMap<String, ModelDefinition>,
    stats: ModelStats,
    active_model: String,
}

#[derive(Debug, Deserialize)]
struct SwitchRequest {
    #[serde(rename = "modelKey", alias = "model_key", default)]
    model_key: Option<String>,
}

#[derive(Debug, Serialize)]
struct SwitchResponse {
    success: bool,
    active_model: String,
}

/// Health check response - returns 200 if healthy, 503 if unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;

    let status_code = match health.status {
        ComponentStatus::Healthy => StatusCode::OK,
        ComponentStatus::Degraded => StatusCode::OK, // Still operational
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

/// Readiness check response - returns 200 if ready, 503 if not ready
async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

/// Prometheus metrics endpoint
async fn metrics() -> Response {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        warn!(error = %e, "Failed to encode metrics");
        return error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string());
    }

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, encoder.format_type().to_string())],
        buffer,
    )
        .into_response()
}

enum UploadError {
    /// The body limit cut the image part short
    TooLarge { filename: String, received: Vec<u8> },
    Multipart(MultipartError),
}

impl From<MultipartError> for UploadError {
    fn from(e: MultipartError) -> Self {
        UploadError::Multipart(e)
    }
}

/// Pull the `image` part out of a multipart upload
async fn read_image(multipart: &mut Multipart) -> Result<Option<(String, Vec<u8>)>, UploadError> {
    while let Some(mut field) = multipart.next_field().await? {
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();

        let mut image = Vec::new();
        loop {
            match field.chunk().await {
                Ok(Some(chunk)) => image.extend_from_slice(&chunk),
                Ok(None) => return Ok(Some((filename, image))),
                Err(e) if e.status() == StatusCode::PAYLOAD_TOO_LARGE => {
                    return Err(UploadError::TooLarge {
                        filename,
                        received: image,
                    });
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
    Ok(None)
}

fn failure_response(failure: PredictionError) -> Response {
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(IdentifyFailure {
            success: false,
            failure,
        }),
    )
        .into_response()
}

/// Identify the species in an uploaded photo
async fn identify(State(state): State<Arc<AppState>>, mut multipart: Multipart) -> Response {
    let (filename, image) = match read_image(&mut multipart).await {
        Ok(Some(upload)) => upload,
        Ok(None) => return error_response(StatusCode::BAD_REQUEST, "No image file provided"),
        Err(UploadError::TooLarge { filename, received }) => {
            warn!(filename = %filename, received = received.len(), "Upload exceeded body limit");
            return failure_response(state.service.reject_oversized(&filename, &received));
        }
        Err(UploadError::Multipart(e)) => return error_response(e.status(), e.body_text()),
    };

    match state.service.predict(&image, &filename).await {
        PredictionOutcome::Success(prediction) => (
            StatusCode::OK,
            Json(IdentifySuccess {
                success: true,
                prediction,
            }),
        )
            .into_response(),
        PredictionOutcome::Failure(failure) => failure_response(failure),
    }
}

async fn list_models(State(state): State<Arc<AppState>>) -> Json<ModelsResponse> {
    let stats = state.service.get_stats();
    Json(ModelsResponse {
        models: state.service.list_models(),
        active_model: stats.active_model.clone(),
        stats,
    })
}

async fn switch_model(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<SwitchRequest>, JsonRejection>,
) -> Response {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => return error_response(StatusCode::BAD_REQUEST, rejection.body_text()),
    };

    let key = match request.model_key.as_deref().map(str::trim) {
        Some(key) if !key.is_empty() => key.to_string(),
        _ => return error_response(StatusCode::BAD_REQUEST, "Model key is required"),
    };

    if !state.service.switch_model(&key) {
        return error_response(StatusCode::BAD_REQUEST, "Invalid model key");
    }

    Json(SwitchResponse {
        success: true,
        active_model: key,
    })
    .into_response()
}

async fn stats(State(state): State<Arc<AppState>>) -> Json<ModelStats> {
    Json(state.service.get_stats())
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    let body_limit = state.max_upload_bytes;

    Router::new()
        .route("/api/identify", post(identify))
        .route("/api/models", get(list_models).post(switch_model))
        .route("/api/stats", get(stats))
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

/// Start the API server, stopping once `shutdown` resolves
pub async fn serve<F>(port: u16, state: Arc<AppState>, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}
