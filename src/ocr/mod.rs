//! Digit recognition.
//!
//! ## Recognizers
//!
//! - **Tesseract**: digit-whitelisted OCR via command-line (default)
//! - **OCRS**: Pure Rust OCR, no external binaries (feature: ocr-ocrs)
//! - **PaddleOCR**: CNN-based, reports per-region scores (feature: ocr-paddle)
//! - **Heuristic**: dark-pixel density scan, always available
//!
//! Use `RecognizerPool` to run every available recognizer over a variant.

mod backend;
mod digits;
mod heuristic;
mod model_utils;
mod pool;
mod tesseract;

#[cfg(feature = "ocr-ocrs")]
mod ocrs_backend;
#[cfg(feature = "ocr-paddle")]
mod paddle_backend;

pub use backend::{
    Detection, RecognizeMode, Recognizer, RecognizerError, RecognizerKind, RecognizerType,
};
pub use digits::{digit_runs, is_digit_string, EXTRACTED_RUN_CONFIDENCE};
pub use heuristic::{HeuristicRecognizer, HEURISTIC_CONFIDENCE};
pub use pool::{PooledDetections, RecognizerPool};
pub use tesseract::{parse_tsv_detections, TesseractRecognizer};

#[cfg(feature = "ocr-ocrs")]
pub use ocrs_backend::OcrsRecognizer;
#[cfg(feature = "ocr-paddle")]
pub use paddle_backend::PaddleRecognizer;
