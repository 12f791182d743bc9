//! Model registry
//!
//! Owns one backend per catalog entry and the active-model pointer. The
//! model set is fixed at construction; only the active key changes, under
//! a single-writer/multiple-reader lock.

use crate::catalog::ModelCatalog;
use crate::error::{ConfigError, InferenceError};
use crate::inference::{create_adapter, AdapterOptions, InferenceAdapter, UnavailableBackend};
use crate::models::{ModelDefinition, ModelStats};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, error, warn};

#[derive(Clone)]
struct ModelEntry {
    definition: Arc<ModelDefinition>,
    adapter: Arc<dyn InferenceAdapter>,
}

/// The model serving a request, captured once per request
///
/// `key` is the configured active key; `serving_key` names the catalog
/// entry actually answering, which differs only after a fallback.
#[derive(Clone)]
pub struct ActiveModel {
    pub key: String,
    pub serving_key: String,
    pub definition: Arc<ModelDefinition>,
    pub adapter: Arc<dyn InferenceAdapter>,
}

pub struct ModelRegistry {
    models: HashMap<String, ModelEntry>,
    active_key: RwLock<String>,
    fallback_key: String,
    fallback: ModelEntry,
    enable_ensemble: bool,
    unavailable: BTreeMap<String, String>,
}

impl ModelRegistry {
    /// Build the registry, loading every backend through the factory
    pub fn from_catalog(catalog: &ModelCatalog, options: &AdapterOptions) -> Result<Self, ConfigError> {
        Self::from_catalog_with(catalog, |_, definition| create_adapter(definition, options))
    }

    /// Build the registry with a caller-supplied backend factory
    ///
    /// A backend that fails to load is replaced by one that fails every
    /// request; the rest of the catalog keeps serving.
    pub fn from_catalog_with<F>(catalog: &ModelCatalog, factory: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str, &ModelDefinition) -> Result<Arc<dyn InferenceAdapter>, InferenceError>,
    {
        catalog.validate()?;

        let mut models = HashMap::with_capacity(catalog.models.len());
        let mut unavailable = BTreeMap::new();

        for (key, definition) in &catalog.models {
            let adapter = match factory(key, definition) {
                Ok(adapter) => {
                    debug!(model = %key, backend = adapter.name(), kind = %definition.kind, "Backend ready");
                    adapter
                }
                Err(e) => {
                    warn!(model = %key, error = %e, "Backend failed to load");
                    unavailable.insert(key.clone(), e.to_string());
                    Arc::new(UnavailableBackend::new(e.to_string())) as Arc<dyn InferenceAdapter>
                }
            };

            models.insert(
                key.clone(),
                ModelEntry {
                    definition: Arc::new(definition.clone()),
                    adapter,
                },
            );
        }

        let fallback = models
            .get(&catalog.fallback_model)
            .cloned()
            .ok_or_else(|| {
                ConfigError::Invalid(format!(
                    "fallback model '{}' is not declared in models",
                    catalog.fallback_model
                ))
            })?;

        Ok(Self {
            models,
            active_key: RwLock::new(catalog.active_model.clone()),
            fallback_key: catalog.fallback_model.clone(),
            fallback,
            enable_ensemble: catalog.enable_ensemble,
            unavailable,
        })
    }

    /// Snapshot of the model that should serve the next request
    ///
    /// Never fails: an active key missing from the catalog resolves to
    /// the fallback model.
    pub fn active(&self) -> ActiveModel {
        let key = self
            .active_key
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        match self.models.get(&key) {
            Some(entry) => ActiveModel {
                serving_key: key.clone(),
                key,
                definition: Arc::clone(&entry.definition),
                adapter: Arc::clone(&entry.adapter),
            },
            None => {
                warn!(
                    active_model = %key,
                    fallback_model = %self.fallback_key,
                    "Active model not found, using fallback"
                );
                ActiveModel {
                    key,
                    serving_key: self.fallback_key.clone(),
                    definition: Arc::clone(&self.fallback.definition),
                    adapter: Arc::clone(&self.fallback.adapter),
                }
            }
        }
    }

    pub fn get_active_model(&self) -> Arc<ModelDefinition> {
        self.active().definition
    }

    /// The configured active key, even when it is not in the catalog
    pub fn active_key(&self) -> String {
        self.active_key
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn get_all_models(&self) -> BTreeMap<String, ModelDefinition> {
        self.models
            .iter()
            .map(|(key, entry)| (key.clone(), entry.definition.as_ref().clone()))
            .collect()
    }

    pub fn model_count(&self) -> usize {
        self.models.len()
    }

    /// Largest upload any catalog model accepts, in bytes
    pub fn max_image_bytes(&self) -> u64 {
        self.models
            .values()
            .map(|entry| entry.definition.max_image_bytes())
            .max()
            .unwrap_or(0)
    }

    /// Models whose backend failed to load
    pub fn unavailable_models(&self) -> Vec<String> {
        self.unavailable.keys().cloned().collect()
    }

    /// Load failure cause per unavailable model
    pub fn unavailable_backends(&self) -> &BTreeMap<String, String> {
        &self.unavailable
    }

    /// Make `key` the active model
    ///
    /// Returns false and leaves the active model untouched when `key` is
    /// not in the catalog. The change lives in memory only.
    pub fn switch_model(&self, key: &str) -> bool {
        if !self.models.contains_key(key) {
            error!(model = %key, "Model not found");
            return false;
        }

        let mut active = self
            .active_key
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        debug!(from = %*active, to = %key, "Switching active model");
        *active = key.to_string();
        true
    }

    pub fn get_stats(&self) -> ModelStats {
        let active = self.active();
        ModelStats {
            active_model: active.key,
            available_models: self.model_count(),
            total_classes: active.definition.classes.len(),
            confidence_threshold: active.definition.confidence_threshold,
            fallback_model: self.fallback_key.clone(),
            enable_ensemble: self.enable_ensemble,
        }
    }
}
