//! Recognizer abstraction for pooling several OCR engines.
//!
//! Supports multiple recognizers:
//! - Tesseract: digit-whitelisted OCR via command-line (CPU)
//! - PaddleOCR: CNN-based region OCR via ONNX Runtime (CPU/GPU)
//! - Ocrs: Pure Rust OCR engine (CPU)
//! - Heuristic: dark-pixel density scan, last-resort noise source
//!
//! Recognizers never see the target. They turn one image variant into a
//! list of digit strings with confidences, and the consolidator decides
//! what matches.

use async_trait::async_trait;
use thiserror::Error;

use crate::preprocess::ImageVariant;

/// Errors from recognizers.
#[derive(Debug, Error)]
pub enum RecognizerError {
    #[error("Recognizer not available: {0}")]
    NotAvailable(String),

    #[error("OCR failed: {0}")]
    OcrFailed(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Recognizer timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    ImageError(String),
}

/// One (text, confidence) observation from a recognizer on one variant.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    /// Digit string.
    pub text: String,
    /// Confidence in 0.0..=1.0.
    pub confidence: f32,
}

impl Detection {
    pub fn new(text: impl Into<String>, confidence: f32) -> Self {
        Self {
            text: text.into(),
            confidence: confidence.clamp(0.0, 1.0),
        }
    }
}

/// Whether a recognizer is a real engine or the heuristic scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecognizerKind {
    /// OCR engine; output is filtered by the confidence threshold.
    Engine,
    /// Low-confidence guesser; exempt from the threshold and only consulted
    /// when no engine produced anything for a tile.
    Heuristic,
}

/// Built-in recognizer types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecognizerType {
    Tesseract,
    PaddleOcr,
    Ocrs,
    Heuristic,
}

impl RecognizerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecognizerType::Tesseract => "tesseract",
            RecognizerType::PaddleOcr => "paddleocr",
            RecognizerType::Ocrs => "ocrs",
            RecognizerType::Heuristic => "heuristic",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "tesseract" => Some(RecognizerType::Tesseract),
            "paddleocr" | "paddle" => Some(RecognizerType::PaddleOcr),
            "ocrs" => Some(RecognizerType::Ocrs),
            "heuristic" | "pattern" => Some(RecognizerType::Heuristic),
            _ => None,
        }
    }
}

impl std::fmt::Display for RecognizerType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How hard recognizers should try.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RecognizeMode {
    #[default]
    Standard,
    /// Run the extra engine configurations as well.
    Enhanced,
}

impl RecognizeMode {
    pub fn from_enhanced(enhanced: bool) -> Self {
        if enhanced {
            RecognizeMode::Enhanced
        } else {
            RecognizeMode::Standard
        }
    }

    pub fn is_enhanced(&self) -> bool {
        matches!(self, RecognizeMode::Enhanced)
    }
}

/// Capability interface for anything that reads digits from an image.
#[async_trait]
pub trait Recognizer: Send + Sync {
    /// Name used in logs and reports.
    fn name(&self) -> &str;

    fn kind(&self) -> RecognizerKind {
        RecognizerKind::Engine
    }

    /// Check if this recognizer can run (binary installed, models present or downloadable).
    fn is_available(&self) -> bool;

    /// Describe what's needed to make this recognizer available.
    fn availability_hint(&self) -> String;

    /// Load models or other expensive state ahead of the first call.
    async fn warm_up(&self) -> Result<(), RecognizerError> {
        Ok(())
    }

    /// Release loaded engine state.
    fn shutdown(&self) {}

    /// Extract digit strings from one image variant.
    async fn recognize(
        &self,
        variant: &ImageVariant,
        mode: RecognizeMode,
    ) -> Result<Vec<Detection>, RecognizerError>;
}
