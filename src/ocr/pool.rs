//! Recognizer pool.
//!
//! Holds every usable recognizer in configuration order and runs all of them
//! over each image variant. A recognizer that errors or times out contributes
//! nothing for that variant; the others still run.
//!
//! The heuristic scan is a last resort: its guesses are consulted only for a
//! tile on which no engine detected anything.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::backend::{
    Detection, RecognizeMode, Recognizer, RecognizerError, RecognizerKind, RecognizerType,
};
use super::digits::retain_confident;
use super::heuristic::HeuristicRecognizer;
use super::tesseract::TesseractRecognizer;
use crate::config::SolverConfig;
use crate::preprocess::ImageVariant;

#[cfg(feature = "ocr-ocrs")]
use super::ocrs_backend::OcrsRecognizer;
#[cfg(feature = "ocr-paddle")]
use super::paddle_backend::PaddleRecognizer;

/// Detections gathered from the pool, split by recognizer kind.
#[derive(Debug, Clone, Default)]
pub struct PooledDetections {
    /// Engine detections at or above the confidence threshold.
    pub engine: Vec<Detection>,
    /// Heuristic guesses, unfiltered.
    pub heuristic: Vec<Detection>,
    /// Detections kept per recognizer name.
    pub counts: BTreeMap<String, usize>,
}

impl PooledDetections {
    pub fn merge(&mut self, other: PooledDetections) {
        self.engine.extend(other.engine);
        self.heuristic.extend(other.heuristic);
        for (name, count) in other.counts {
            *self.counts.entry(name).or_default() += count;
        }
    }

    pub fn total(&self) -> usize {
        self.engine.len() + self.heuristic.len()
    }

    /// Detections to consolidate: engine output, or the heuristic guesses
    /// when no engine saw anything.
    pub fn into_candidates(self) -> Vec<Detection> {
        if self.engine.is_empty() {
            self.heuristic
        } else {
            self.engine
        }
    }
}

/// Ordered set of recognizers sharing one threshold and timeout.
pub struct RecognizerPool {
    recognizers: Vec<Arc<dyn Recognizer>>,
    confidence_threshold: f32,
    timeout: Duration,
}

impl RecognizerPool {
    /// Create an empty pool.
    pub fn new(confidence_threshold: f32, timeout: Duration) -> Self {
        Self {
            recognizers: Vec::new(),
            confidence_threshold,
            timeout,
        }
    }

    /// Build the pool from the configured recognizer names.
    ///
    /// Unknown or unavailable recognizers are skipped. The heuristic scan is
    /// appended last when enabled.
    pub fn from_config(config: &SolverConfig) -> Self {
        let mut pool = Self::new(config.confidence_threshold, config.recognizer_timeout());

        for name in &config.recognizers {
            match Self::create_recognizer(name, config) {
                Some(recognizer) if recognizer.is_available() => {
                    debug!("Recognizer pool: added {}", recognizer.name());
                    pool.register(recognizer);
                }
                Some(recognizer) => {
                    debug!(
                        "Recognizer pool: {} not available ({})",
                        name,
                        recognizer.availability_hint()
                    );
                }
                None if RecognizerType::from_str(name).is_some() => {
                    debug!("Recognizer pool: {} not compiled into this build", name);
                }
                None => warn!("Recognizer pool: unknown recognizer '{}'", name),
            }
        }

        if config.heuristic
            && !pool
                .recognizers
                .iter()
                .any(|r| r.kind() == RecognizerKind::Heuristic)
        {
            pool.register(Arc::new(HeuristicRecognizer::new()));
        }

        info!(
            "Recognizer pool initialized with {} recognizers",
            pool.recognizers.len()
        );
        pool
    }

    /// Create a recognizer by name.
    pub fn create_recognizer(name: &str, config: &SolverConfig) -> Option<Arc<dyn Recognizer>> {
        match RecognizerType::from_str(name)? {
            RecognizerType::Tesseract => Some(Arc::new(TesseractRecognizer::with_config(
                config.tesseract.clone(),
            ))),
            RecognizerType::Heuristic => Some(Arc::new(HeuristicRecognizer::new())),
            #[cfg(feature = "ocr-paddle")]
            RecognizerType::PaddleOcr => Some(Arc::new(PaddleRecognizer::with_model_path(
                config.model_path.as_ref().map(|p| p.join("paddle-ocr")),
            ))),
            #[cfg(feature = "ocr-ocrs")]
            RecognizerType::Ocrs => Some(Arc::new(OcrsRecognizer::with_model_path(
                config.model_path.as_ref().map(|p| p.join("ocrs")),
            ))),
            #[allow(unreachable_patterns)]
            _ => None,
        }
    }

    /// Append a recognizer to the end of the pool.
    pub fn register(&mut self, recognizer: Arc<dyn Recognizer>) {
        self.recognizers.push(recognizer);
    }

    pub fn recognizers(&self) -> &[Arc<dyn Recognizer>] {
        &self.recognizers
    }

    pub fn is_empty(&self) -> bool {
        self.recognizers.is_empty()
    }

    /// True when at least one real engine (not the heuristic) is pooled.
    pub fn has_engines(&self) -> bool {
        self.recognizers
            .iter()
            .any(|r| r.kind() == RecognizerKind::Engine)
    }

    /// Load every recognizer's models up front. Failures are logged; the
    /// recognizer stays pooled and retries loading on first use.
    pub async fn warm_up(&self) {
        for recognizer in &self.recognizers {
            if let Err(e) = recognizer.warm_up().await {
                warn!("Failed to warm up {}: {}", recognizer.name(), e);
            }
        }
    }

    /// Release engine state held by every recognizer.
    pub fn shutdown(&self) {
        for recognizer in &self.recognizers {
            recognizer.shutdown();
        }
    }

    /// Run every recognizer over one variant.
    pub async fn recognize_variant(
        &self,
        variant: &ImageVariant,
        mode: RecognizeMode,
    ) -> PooledDetections {
        let mut pooled = PooledDetections::default();

        for recognizer in &self.recognizers {
            let name = recognizer.name();
            let result = tokio::time::timeout(self.timeout, recognizer.recognize(variant, mode))
                .await
                .unwrap_or(Err(RecognizerError::Timeout(self.timeout)));
            let mut detections = match result {
                Ok(detections) => detections,
                Err(e) => {
                    warn!("{} failed on {} variant: {}", name, variant.kind, e);
                    continue;
                }
            };

            match recognizer.kind() {
                RecognizerKind::Engine => {
                    retain_confident(&mut detections, self.confidence_threshold);
                    *pooled.counts.entry(name.to_string()).or_default() += detections.len();
                    pooled.engine.extend(detections);
                }
                RecognizerKind::Heuristic => {
                    *pooled.counts.entry(name.to_string()).or_default() += detections.len();
                    pooled.heuristic.extend(detections);
                }
            }
        }

        pooled
    }

    /// Run every recognizer over every variant and merge the results.
    pub async fn recognize_all<I>(&self, variants: I, mode: RecognizeMode) -> PooledDetections
    where
        I: IntoIterator<Item = ImageVariant>,
    {
        let mut pooled = PooledDetections::default();
        for variant in variants {
            pooled.merge(self.recognize_variant(&variant, mode).await);
        }
        pooled
    }
}
