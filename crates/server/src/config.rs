//! Server configuration

use anyhow::{Context, Result};
use model_service::{AdapterOptions, DEFAULT_CATALOG_PATH};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Headroom for multipart framing on top of the largest accepted image
pub const MULTIPART_ALLOWANCE: usize = 64 * 1024;

/// Server configuration, read from `FLORA_*` environment variables
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Location of the model catalog document
    #[serde(default = "default_catalog_path")]
    pub catalog_path: PathBuf,

    /// HTTP listen port
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Upper bound on a single inference call in milliseconds
    #[serde(default = "default_inference_timeout_ms")]
    pub inference_timeout_ms: u64,

    /// Per-call delay of the simulated backend in milliseconds
    #[serde(default = "default_simulated_latency_ms")]
    pub simulated_latency_ms: u64,

    /// Request body limit for uploads, raised to fit the largest catalog image
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            catalog_path: default_catalog_path(),
            api_port: default_api_port(),
            inference_timeout_ms: default_inference_timeout_ms(),
            simulated_latency_ms: default_simulated_latency_ms(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

fn default_catalog_path() -> PathBuf {
    PathBuf::from(DEFAULT_CATALOG_PATH)
}

fn default_api_port() -> u16 {
    8080
}

fn default_inference_timeout_ms() -> u64 {
    5000
}

fn default_simulated_latency_ms() -> u64 {
    100
}

fn default_max_upload_bytes() -> usize {
    10 * 1024 * 1024
}

impl ServerConfig {
    /// Load configuration from the environment
    pub fn load() -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix("FLORA").try_parsing(true))
            .build()
            .context("Failed to read FLORA_* environment")?;

        config
            .try_deserialize()
            .context("Invalid FLORA_* server settings")
    }

    pub fn inference_timeout(&self) -> Duration {
        Duration::from_millis(self.inference_timeout_ms)
    }

    /// Body limit that still lets every catalog model see its own size error
    pub fn body_limit(&self, max_image_bytes: u64) -> usize {
        let catalog_limit = usize::try_from(max_image_bytes)
            .unwrap_or(usize::MAX)
            .saturating_add(MULTIPART_ALLOWANCE);
        self.max_upload_bytes.max(catalog_limit)
    }

    pub fn adapter_options(&self) -> AdapterOptions {
        AdapterOptions {
            simulated_latency: Duration::from_millis(self.simulated_latency_ms),
            seed: None,
        }
    }
}
