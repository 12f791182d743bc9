//! ONNX image classifier using tract
//!
//! Runs trained networks exported to ONNX. Input is an NHWC `[1, h, w, 3]`
//! f32 tensor built from the model's preprocessing settings; the first
//! output is read as per-class scores.

use super::preprocess;
use super::{Inference, InferenceAdapter};
use crate::compute_checksum;
use crate::error::InferenceError;
use crate::models::{ModelDefinition, PreprocessingConfig};
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tract_onnx::prelude::*;
use tracing::{debug, warn};

/// Inference latency above which a warning is logged
const SLOW_INFERENCE_MS: u128 = 500;

type TractModel = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// Trained network backend
pub struct OnnxClassifier {
    model: Arc<TractModel>,
    classes: Arc<Vec<String>>,
    preprocessing: PreprocessingConfig,
    inference_count: AtomicU64,
    slow_inference_count: AtomicU64,
}

impl OnnxClassifier {
    /// Load the network named by a catalog entry, verifying its checksum
    pub fn from_definition(definition: &ModelDefinition) -> Result<Self, InferenceError> {
        let path = &definition.model_path;
        let bytes = std::fs::read(path).map_err(|e| {
            InferenceError::Unavailable(format!("Failed to read model file {:?}: {}", path, e))
        })?;

        if let Some(expected) = &definition.checksum {
            let computed = compute_checksum(&bytes);
            if !computed.eq_ignore_ascii_case(expected) {
                return Err(InferenceError::Unavailable(format!(
                    "Checksum mismatch: expected {}, got {}",
                    expected, computed
                )));
            }
        }

        Self::from_bytes(&bytes, definition)
    }

    /// Build a classifier from in-memory model bytes
    pub fn from_bytes(
        model_bytes: &[u8],
        definition: &ModelDefinition,
    ) -> Result<Self, InferenceError> {
        let model = Self::load_model(model_bytes, &definition.preprocessing).map_err(|e| {
            InferenceError::Unavailable(format!("Failed to load ONNX model: {:#}", e))
        })?;

        debug!(
            model = %definition.name,
            version = %definition.version,
            classes = definition.classes.len(),
            "ONNX model loaded"
        );

        Ok(Self {
            model: Arc::new(model),
            classes: Arc::new(definition.classes.clone()),
            preprocessing: definition.preprocessing.clone(),
            inference_count: AtomicU64::new(0),
            slow_inference_count: AtomicU64::new(0),
        })
    }

    /// Parse and optimize an ONNX graph for a fixed input shape
    fn load_model(model_bytes: &[u8], preprocessing: &PreprocessingConfig) -> TractResult<TractModel> {
        let [width, height] = preprocessing.resize;
        tract_onnx::onnx()
            .model_for_read(&mut std::io::Cursor::new(model_bytes))?
            .with_input_fact(0, f32::fact([1, height as usize, width as usize, 3]).into())?
            .into_optimized()?
            .into_runnable()
    }
}

fn run_model(
    model: &TractModel,
    classes: &[String],
    preprocessing: &PreprocessingConfig,
    image: &[u8],
) -> Result<Inference, InferenceError> {
    let decoded = preprocess::decode(image)?;
    let data = preprocess::to_tensor_data(&decoded, preprocessing);
    let [width, height] = preprocessing.resize;

    let input: Tensor =
        tract_ndarray::Array4::from_shape_vec((1, height as usize, width as usize, 3), data)
            .map_err(|e| InferenceError::Backend(format!("Invalid input shape: {}", e)))?
            .into();

    let outputs = model
        .run(tvec!(input.into()))
        .map_err(|e| InferenceError::Backend(format!("{:#}", e)))?;
    let output = outputs
        .first()
        .ok_or_else(|| InferenceError::Backend("No output from model".to_string()))?;
    let scores: Vec<f32> = output
        .to_array_view::<f32>()
        .map_err(|e| InferenceError::Backend(format!("Unexpected output type: {:#}", e)))?
        .iter()
        .copied()
        .collect();

    classify(&scores, classes)
}

/// Pick the top class from raw scores
///
/// Scores that already form a probability distribution are used as is;
/// anything else is treated as logits and passed through softmax.
pub(crate) fn classify(scores: &[f32], classes: &[String]) -> Result<Inference, InferenceError> {
    let probabilities = if is_distribution(scores) {
        scores.to_vec()
    } else {
        softmax(scores)
    };

    let (index, confidence) = probabilities
        .iter()
        .copied()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .ok_or_else(|| InferenceError::Backend("Model produced no scores".to_string()))?;

    let class = classes.get(index).ok_or_else(|| {
        InferenceError::Backend(format!(
            "Model predicted class index {} but only {} classes are configured",
            index,
            classes.len()
        ))
    })?;

    Ok(Inference {
        class: class.clone(),
        confidence,
    })
}

fn is_distribution(scores: &[f32]) -> bool {
    let sum: f32 = scores.iter().sum();
    scores.iter().all(|s| (0.0..=1.0).contains(s)) && (sum - 1.0).abs() < 1e-3
}

fn softmax(scores: &[f32]) -> Vec<f32> {
    let max = scores.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = scores.iter().map(|s| (s - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

#[async_trait]
impl InferenceAdapter for OnnxClassifier {
    async fn infer(&self, image: &[u8]) -> Result<Inference, InferenceError> {
        let start = Instant::now();
        let model = Arc::clone(&self.model);
        let classes = Arc::clone(&self.classes);
        let preprocessing = self.preprocessing.clone();
        let image = image.to_vec();

        let result = tokio::task::spawn_blocking(move || {
            run_model(&model, &classes, &preprocessing, &image)
        })
        .await
        .map_err(|e| InferenceError::Backend(format!("Inference task failed: {}", e)))?;

        let elapsed = start.elapsed();
        let total = self.inference_count.fetch_add(1, Ordering::Relaxed) + 1;

        if elapsed.as_millis() > SLOW_INFERENCE_MS {
            let slow = self.slow_inference_count.fetch_add(1, Ordering::Relaxed) + 1;
            warn!(
                elapsed_ms = elapsed.as_millis() as u64,
                slow_inferences = slow,
                total_inferences = total,
                "Inference exceeded {}ms target",
                SLOW_INFERENCE_MS
            );
        } else {
            debug!(elapsed_us = elapsed.as_micros() as u64, total_inferences = total, "Inference completed");
        }

        result
    }

    fn name(&self) -> &str {
        "onnx"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BackendKind;
    use tempfile::TempDir;

    fn labels() -> Vec<String> {
        vec![
            "Rhizophora mangle".to_string(),
            "Avicennia germinans".to_string(),
            "Laguncularia racemosa".to_string(),
        ]
    }

    fn definition(path: std::path::PathBuf, checksum: Option<String>) -> ModelDefinition {
        ModelDefinition {
            name: "Mangrove Net".to_string(),
            kind: BackendKind::NeuralNet,
            version: "2.0.0".to_string(),
            description: String::new(),
            model_path: path,
            confidence_threshold: 0.5,
            supported_formats: vec!["jpg".to_string()],
            max_image_size: 1024,
            preprocessing: PreprocessingConfig {
                resize: [224, 224],
                normalize: true,
                augmentation: false,
            },
            classes: labels(),
            checksum,
        }
    }

    #[test]
    fn test_classify_probabilities() {
        let inference = classify(&[0.1, 0.7, 0.2], &labels()).unwrap();
        assert_eq!(inference.class, "Avicennia germinans");
        assert!((inference.confidence - 0.7).abs() < 1e-6);
    }

    #[test]
    fn test_classify_logits_uses_softmax() {
        let inference = classify(&[2.0, 1.0, 5.0], &labels()).unwrap();
        assert_eq!(inference.class, "Laguncularia racemosa");
        assert!(inference.confidence > 0.9 && inference.confidence <= 1.0);
    }

    #[test]
    fn test_classify_index_outside_labels() {
        let err = classify(&[0.1, 0.1, 0.1, 0.7], &labels()).unwrap_err();
        assert!(err.to_string().contains("index 3"));
    }

    #[test]
    fn test_classify_empty_scores() {
        assert!(classify(&[], &labels()).is_err());
    }

    #[test]
    fn test_missing_model_file_is_unavailable() {
        let temp_dir = TempDir::new().unwrap();
        let def = definition(temp_dir.path().join("missing.onnx"), None);
        assert!(matches!(
            OnnxClassifier::from_definition(&def),
            Err(InferenceError::Unavailable(_))
        ));
    }

    #[test]
    fn test_checksum_mismatch_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("model.onnx");
        std::fs::write(&path, b"not really onnx").unwrap();

        let def = definition(path, Some("00".repeat(32)));
        let err = OnnxClassifier::from_definition(&def).err().unwrap();
        assert!(err.to_string().contains("Checksum mismatch"));
    }

    #[test]
    fn test_invalid_graph_is_unavailable() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("model.onnx");
        std::fs::write(&path, b"not really onnx").unwrap();

        let checksum = compute_checksum(b"not really onnx");
        let def = definition(path, Some(checksum));
        let err = OnnxClassifier::from_definition(&def).err().unwrap();
        assert!(err.to_string().contains("Failed to load ONNX model"));
    }
}
