//! Model catalog loading and validation
//!
//! The catalog is a JSON document naming the active model, a fallback
//! model, every model definition, and logging preferences. It is read
//! once at startup; a catalog that fails validation must stop the
//! service from serving requests.

use crate::error::ConfigError;
use crate::models::{LoggingConfig, ModelDefinition, SpeciesRecord};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Default catalog location, relative to the working directory
pub const DEFAULT_CATALOG_PATH: &str = "model-config.json";

/// The declarative set of models the service can run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelCatalog {
    #[serde(rename = "activeModel", alias = "active_model")]
    pub active_model: String,

    #[serde(alias = "fallbackModel")]
    pub fallback_model: String,

    /// Reserved, not used when routing predictions
    #[serde(default)]
    pub enable_ensemble: bool,

    pub models: BTreeMap<String, ModelDefinition>,

    #[serde(default)]
    pub logging: LoggingConfig,

    /// Extra Knowledge Base entries keyed by class label
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub species: BTreeMap<String, SpeciesRecord>,
}

impl ModelCatalog {
    /// Parse and validate a catalog document
    pub fn from_json(document: &str) -> Result<Self, ConfigError> {
        let mut catalog: ModelCatalog = serde_json::from_str(document)?;
        catalog.normalize();
        catalog.validate()?;
        Ok(catalog)
    }

    fn normalize(&mut self) {
        for model in self.models.values_mut() {
            for format in model.supported_formats.iter_mut() {
                *format = format.trim().trim_start_matches('.').to_lowercase();
            }
            model.supported_formats.retain(|f| !f.is_empty());
        }
    }

    /// Check the catalog invariants
    ///
    /// An active key missing from `models` is accepted: lookups degrade
    /// to the fallback model instead.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.models.is_empty() {
            return Err(ConfigError::Invalid("no models declared".to_string()));
        }

        if !self.models.contains_key(&self.fallback_model) {
            return Err(ConfigError::Invalid(format!(
                "fallback model '{}' is not declared in models",
                self.fallback_model
            )));
        }

        for (key, model) in &self.models {
            validate_model(key, model)?;
        }

        if !self.models.contains_key(&self.active_model) {
            warn!(
                active_model = %self.active_model,
                fallback_model = %self.fallback_model,
                "Active model not declared in catalog, fallback will be used"
            );
        }

        Ok(())
    }
}

fn validate_model(key: &str, model: &ModelDefinition) -> Result<(), ConfigError> {
    let invalid = |reason: String| ConfigError::Invalid(format!("model '{}': {}", key, reason));

    let threshold = model.confidence_threshold;
    if !threshold.is_finite() || !(0.0..=1.0).contains(&threshold) {
        return Err(invalid(format!(
            "confidence_threshold {} is outside [0, 1]",
            threshold
        )));
    }

    if model.classes.is_empty() {
        return Err(invalid("classes must not be empty".to_string()));
    }

    if model.supported_formats.is_empty() {
        return Err(invalid("supported_formats must not be empty".to_string()));
    }

    if model.max_image_size == 0 {
        return Err(invalid("max_image_size must be greater than zero".to_string()));
    }

    let [width, height] = model.preprocessing.resize;
    if width == 0 || height == 0 {
        return Err(invalid(format!(
            "preprocessing.resize {}x{} must be non-zero",
            width, height
        )));
    }

    Ok(())
}

/// Reads the catalog document from disk
#[derive(Debug, Clone)]
pub struct CatalogStore {
    path: PathBuf,
}

impl Default for CatalogStore {
    fn default() -> Self {
        Self::new(DEFAULT_CATALOG_PATH)
    }
}

impl CatalogStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load and validate the catalog
    pub fn load(&self) -> Result<ModelCatalog, ConfigError> {
        let document = std::fs::read_to_string(&self.path).map_err(|source| ConfigError::Read {
            path: self.path.clone(),
            source,
        })?;

        ModelCatalog::from_json(&document)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BackendKind;
    use tempfile::TempDir;

    const CATALOG: &str = r#"{
        "activeModel": "cv1",
        "fallback_model": "cv1",
        "enable_ensemble": false,
        "models": {
            "cv1": {
                "name": "Mangrove Classifier",
                "type": "opencv",
                "version": "1.0.0",
                "description": "Colour and texture pipeline",
                "modelPath": "models/cv1.xml",
                "confidence_threshold": 0.6,
                "supported_formats": ["JPG", ".png"],
                "max_image_size": 500,
                "preprocessing": { "resize": [224, 224], "normalize": true, "augmentation": false },
                "classes": ["Rhizophora mangle", "Avicennia germinans"]
            }
        },
        "logging": { "level": "debug", "log_predictions": true, "log_errors": false }
    }"#;

    #[test]
    fn test_parse_catalog() {
        let catalog = ModelCatalog::from_json(CATALOG).unwrap();
        assert_eq!(catalog.active_model, "cv1");
        assert_eq!(catalog.fallback_model, "cv1");

        let model = &catalog.models["cv1"];
        assert_eq!(model.kind, BackendKind::ClassicalVision);
        assert_eq!(model.supported_formats, vec!["jpg", "png"]);
        assert_eq!(model.max_image_bytes(), 500 * 1024);
        assert!(!catalog.logging.log_errors);
    }

    #[test]
    fn test_missing_fallback_is_rejected() {
        let document = CATALOG.replace(r#""fallback_model": "cv1""#, r#""fallback_model": "nn2""#);
        let err = ModelCatalog::from_json(&document).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
        assert!(err.to_string().contains("nn2"));
    }

    #[test]
    fn test_threshold_out_of_range_is_rejected() {
        let document = CATALOG.replace("0.6", "1.5");
        let err = ModelCatalog::from_json(&document).unwrap_err();
        assert!(err.to_string().contains("confidence_threshold"));
    }

    #[test]
    fn test_empty_classes_are_rejected() {
        let document = CATALOG.replace(
            r#"["Rhizophora mangle", "Avicennia germinans"]"#,
            "[]",
        );
        let err = ModelCatalog::from_json(&document).unwrap_err();
        assert!(err.to_string().contains("classes"));
    }

    #[test]
    fn test_empty_formats_are_rejected() {
        let document = CATALOG.replace(r#"["JPG", ".png"]"#, "[]");
        let err = ModelCatalog::from_json(&document).unwrap_err();
        assert!(err.to_string().contains("supported_formats"));
    }

    #[test]
    fn test_missing_field_is_parse_error() {
        let document = CATALOG.replace(r#""version": "1.0.0","#, "");
        let err = ModelCatalog::from_json(&document).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_unknown_active_model_is_accepted() {
        let document = CATALOG.replace(r#""activeModel": "cv1""#, r#""activeModel": "gone""#);
        let catalog = ModelCatalog::from_json(&document).unwrap();
        assert_eq!(catalog.active_model, "gone");
    }

    #[test]
    fn test_store_load_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("model-config.json");
        std::fs::write(&path, CATALOG).unwrap();

        let catalog = CatalogStore::new(&path).load().unwrap();
        assert_eq!(catalog.models.len(), 1);
    }

    #[test]
    fn test_store_missing_file_is_read_error() {
        let temp_dir = TempDir::new().unwrap();
        let store = CatalogStore::new(temp_dir.path().join("absent.json"));
        assert!(matches!(store.load(), Err(ConfigError::Read { .. })));
    }

    #[test]
    fn test_bundled_catalog_is_valid() {
        let catalog = ModelCatalog::from_json(include_str!("../../../model-config.json")).unwrap();
        assert_eq!(catalog.active_model, "cv1");
        assert_eq!(catalog.models["nn1"].kind, BackendKind::NeuralNet);
        assert!(catalog.species.contains_key("Laguncularia racemosa"));
    }
}
