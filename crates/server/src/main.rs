//! Flora Server - plant photo identification service
//!
//! Loads the model catalog, builds one backend per model and serves the
//! identification and model management API over HTTP.

use anyhow::{Context, Result};
use model_service::{
    health::{components, HealthRegistry},
    observability::StructuredLogger,
    CatalogStore, LogLevel, ModelCatalog, ModelRegistry, PredictionConfig, PredictionService,
    SpeciesKnowledgeBase,
};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod api;
mod config;

const SERVICE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// `RUST_LOG` wins over the catalog's logging level
fn env_filter(level: LogLevel) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()))
}

/// Build the prediction service and health state from a loaded catalog
async fn build_state(
    config: &config::ServerConfig,
    catalog: &ModelCatalog,
    logger: &StructuredLogger,
) -> Result<Arc<api::AppState>> {
    let health_registry = HealthRegistry::new();
    health_registry.register(components::REGISTRY).await;

    let registry = ModelRegistry::from_catalog(catalog, &config.adapter_options())
        .context("Failed to build model registry")?;

    for (model, cause) in registry.unavailable_backends() {
        logger.log_backend_unavailable(model, cause);
    }
    health_registry
        .report_backends(&registry.unavailable_models(), registry.model_count())
        .await;

    let body_limit = config.body_limit(registry.max_image_bytes());
    let species = SpeciesKnowledgeBase::builtin().with_records(catalog.species.clone());

    let service = PredictionService::new(
        Arc::new(registry),
        Arc::new(species),
        PredictionConfig {
            inference_timeout: config.inference_timeout(),
            logging: catalog.logging.clone(),
        },
    );

    Ok(Arc::new(api::AppState::new(
        Arc::new(service),
        health_registry,
        body_limit,
    )))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = config::ServerConfig::load()?;
    let store = CatalogStore::new(&config.catalog_path);
    let catalog = store.load().context("Model catalog could not be loaded")?;

    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(env_filter(catalog.logging.level))
        .with(fmt::layer().json())
        .init();

    let logger = StructuredLogger::new("flora-server");
    let model_keys: Vec<&str> = catalog.models.keys().map(String::as_str).collect();
    logger.log_catalog_loaded(
        &store.path().display().to_string(),
        &catalog.active_model,
        &catalog.fallback_model,
        &model_keys,
    );

    let state = build_state(&config, &catalog, &logger).await?;

    let registry = state.service.registry();
    logger.log_startup(SERVICE_VERSION, &registry.active().key, registry.model_count());

    // Mark service as ready after initialization
    state.health_registry.set_ready(true).await;

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    let api_handle = tokio::spawn(api::serve(config.api_port, state, async move {
        let _ = shutdown_rx.await;
    }));

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    logger.log_shutdown("SIGINT received");
    info!("Shutting down");

    let _ = shutdown_tx.send(());
    api_handle.await??;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use model_service::ComponentStatus;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_catalog(json: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(json.as_bytes()).unwrap();
        file
    }

    const CATALOG: &str = r#"{
        "activeModel": "cv1",
        "fallback_model": "cv1",
        "models": {
            "cv1": {
                "name": "Mangrove Classifier",
                "type": "classical-vision",
                "version": "1.0.0",
                "modelPath": "models/cv1.xml",
                "confidence_threshold": 0.6,
                "supported_formats": ["jpg"],
                "max_image_size": 500,
                "preprocessing": { "resize": [224, 224], "normalize": true },
                "classes": ["Laguncularia racemosa"]
            },
            "nn1": {
                "name": "Missing Network",
                "type": "onnx",
                "version": "2.0.0",
                "modelPath": "/nonexistent/model.onnx",
                "confidence_threshold": 0.7,
                "supported_formats": ["jpg"],
                "max_image_size": 500,
                "preprocessing": { "resize": [224, 224], "normalize": true },
                "classes": ["Rhizophora mangle"]
            }
        },
        "logging": { "level": "warn", "log_predictions": false, "log_errors": true },
        "species": {
            "Laguncularia racemosa": {
                "scientific_name": "Laguncularia racemosa",
                "common_name": "White Mangrove",
                "family": "Combretaceae",
                "habitat": "Upper tidal zones"
            }
        }
    }"#;

    #[tokio::test]
    async fn test_build_state_from_catalog_file() {
        let file = write_catalog(CATALOG);
        let catalog = CatalogStore::new(file.path()).load().unwrap();
        assert_eq!(catalog.logging.level, LogLevel::Warn);

        let config = super::config::ServerConfig {
            simulated_latency_ms: 0,
            ..Default::default()
        };
        let logger = StructuredLogger::new("test");
        let state = build_state(&config, &catalog, &logger).await.unwrap();

        assert_eq!(state.service.registry().unavailable_models(), vec!["nn1".to_string()]);
        assert_eq!(
            state.health_registry.health().await.status,
            ComponentStatus::Degraded
        );
        assert!(!state.health_registry.readiness().await.ready);
        assert_eq!(state.max_upload_bytes, config.max_upload_bytes);

        let result = state
            .service
            .predict(&[0u8; 128], "leaf.jpg")
            .await
            .into_result()
            .unwrap();
        assert_eq!(result.species_info.common_name, "White Mangrove");
        assert_eq!(result.species_info.conservation_status_or_unknown(), "Unknown");
    }

    #[tokio::test]
    async fn test_unreadable_catalog_is_fatal() {
        let store = CatalogStore::new("/nonexistent/model-config.json");
        assert!(store.load().is_err());

        let file = write_catalog(r#"{"activeModel": "cv1", "fallback_model": "cv1", "models": {}}"#);
        assert!(CatalogStore::new(file.path()).load().is_err());
    }
}
