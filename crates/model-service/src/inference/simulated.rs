//! Simulated backend
//!
//! Stands in for the classical-vision and custom pipelines: picks a class
//! uniformly at random and draws a confidence uniformly from
//! `[threshold, 1]`. The image bytes are not inspected. Randomness comes
//! from a `StdRng`, seeded from OS entropy unless a seed is given.

use super::{Inference, InferenceAdapter};
use crate::error::InferenceError;
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::sync::Mutex;
use std::time::Duration;

/// Per-call delay mimicking a real pipeline
pub const DEFAULT_SIMULATED_LATENCY: Duration = Duration::from_millis(100);

pub struct SimulatedBackend {
    classes: Vec<String>,
    threshold: f32,
    latency: Duration,
    rng: Mutex<StdRng>,
}

impl SimulatedBackend {
    pub fn new(classes: Vec<String>, threshold: f32, latency: Duration) -> Self {
        Self::with_rng(classes, threshold, latency, StdRng::from_entropy())
    }

    /// Reproducible variant for tests and demos
    pub fn with_seed(classes: Vec<String>, threshold: f32, latency: Duration, seed: u64) -> Self {
        Self::with_rng(classes, threshold, latency, StdRng::seed_from_u64(seed))
    }

    fn with_rng(classes: Vec<String>, threshold: f32, latency: Duration, rng: StdRng) -> Self {
        Self {
            classes,
            threshold: threshold.clamp(0.0, 1.0),
            latency,
            rng: Mutex::new(rng),
        }
    }

    fn sample(&self) -> Result<Inference, InferenceError> {
        let mut rng = self
            .rng
            .lock()
            .map_err(|_| InferenceError::Backend("Random source poisoned".to_string()))?;

        let class = self
            .classes
            .choose(&mut *rng)
            .cloned()
            .ok_or_else(|| InferenceError::Backend("Model declares no classes".to_string()))?;

        let raw: f32 = rng.gen_range(self.threshold..=1.0);
        // Three decimals, never below the threshold after rounding
        let confidence = ((raw * 1000.0).round() / 1000.0).clamp(self.threshold, 1.0);

        Ok(Inference { class, confidence })
    }
}

#[async_trait]
impl InferenceAdapter for SimulatedBackend {
    async fn infer(&self, _image: &[u8]) -> Result<Inference, InferenceError> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.sample()
    }

    fn name(&self) -> &str {
        "simulated"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classes() -> Vec<String> {
        vec![
            "Rhizophora mangle".to_string(),
            "Avicennia germinans".to_string(),
        ]
    }

    #[tokio::test]
    async fn test_confidence_above_threshold() {
        let backend = SimulatedBackend::new(classes(), 0.6, Duration::ZERO);

        for _ in 0..200 {
            let inference = backend.infer(&[]).await.unwrap();
            assert!(classes().contains(&inference.class));
            assert!(
                (0.6..=1.0).contains(&inference.confidence),
                "confidence was {}",
                inference.confidence
            );
        }
    }

    #[tokio::test]
    async fn test_seeded_backends_agree() {
        let first = SimulatedBackend::with_seed(classes(), 0.3, Duration::ZERO, 42);
        let second = SimulatedBackend::with_seed(classes(), 0.3, Duration::ZERO, 42);

        for _ in 0..20 {
            assert_eq!(first.infer(&[]).await.unwrap(), second.infer(&[]).await.unwrap());
        }
    }

    #[tokio::test]
    async fn test_threshold_of_one() {
        let backend = SimulatedBackend::with_seed(classes(), 1.0, Duration::ZERO, 7);
        assert_eq!(backend.infer(&[]).await.unwrap().confidence, 1.0);
    }

    #[tokio::test]
    async fn test_no_classes_is_backend_error() {
        let backend = SimulatedBackend::new(Vec::new(), 0.5, Duration::ZERO);
        assert!(matches!(
            backend.infer(&[]).await,
            Err(InferenceError::Backend(_))
        ));
    }
}
