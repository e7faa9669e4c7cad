//! OCRS recognizer.
//!
//! Uses the ocrs crate for pure-Rust OCR without external dependencies.
//! OCRS does not report confidences, so digit runs get the same fixed
//! confidence as runs mined from plain Tesseract text.
//!
//! Models are automatically downloaded on first use from:
//! https://ocrs-models.s3-accelerate.amazonaws.com/

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::backend::{Detection, RecognizeMode, Recognizer, RecognizerError};
use super::digits::{runs_with_confidence, EXTRACTED_RUN_CONFIDENCE};
use super::model_utils::{ModelSpec, ModelStore};
use crate::preprocess::ImageVariant;

const MODEL_STORE: ModelStore = ModelStore {
    subdir: "ocrs",
    required_files: &["text-detection.rten", "text-recognition.rten"],
};

const DETECTION_MODEL: ModelSpec = ModelSpec {
    url: "https://ocrs-models.s3-accelerate.amazonaws.com/text-detection.rten",
    filename: "text-detection.rten",
    size_hint: "2.5 MB",
};

const RECOGNITION_MODEL: ModelSpec = ModelSpec {
    url: "https://ocrs-models.s3-accelerate.amazonaws.com/text-recognition.rten",
    filename: "text-recognition.rten",
    size_hint: "10 MB",
};

/// OCRS recognizer (pure Rust).
pub struct OcrsRecognizer {
    model_path: Option<PathBuf>,
    engine: Arc<Mutex<Option<Arc<ocrs::OcrEngine>>>>,
}

impl OcrsRecognizer {
    pub fn new() -> Self {
        Self::with_model_path(None)
    }

    pub fn with_model_path(model_path: Option<PathBuf>) -> Self {
        Self {
            model_path,
            engine: Arc::new(Mutex::new(None)),
        }
    }

    /// Return the loaded engine, loading it off the runtime on first use.
    async fn engine(&self) -> Result<Arc<ocrs::OcrEngine>, RecognizerError> {
        let slot = Arc::clone(&self.engine);
        let model_path = self.model_path.clone();
        tokio::task::spawn_blocking(move || cached_engine(&slot, model_path.as_ref()))
            .await
            .map_err(|e| RecognizerError::OcrFailed(format!("OCRS load task failed: {}", e)))?
    }
}

fn cached_engine(
    slot: &Mutex<Option<Arc<ocrs::OcrEngine>>>,
    model_path: Option<&PathBuf>,
) -> Result<Arc<ocrs::OcrEngine>, RecognizerError> {
    let mut slot = slot
        .lock()
        .map_err(|e| RecognizerError::OcrFailed(format!("Failed to lock OCRS engine: {}", e)))?;
    if let Some(engine) = slot.as_ref() {
        return Ok(Arc::clone(engine));
    }

    let engine = Arc::new(load_engine(model_path)?);
    *slot = Some(Arc::clone(&engine));
    Ok(engine)
}

impl Default for OcrsRecognizer {
    fn default() -> Self {
        Self::new()
    }
}

fn load_engine(model_path: Option<&PathBuf>) -> Result<ocrs::OcrEngine, RecognizerError> {
    let model_dir = MODEL_STORE.ensure(model_path, &[&DETECTION_MODEL, &RECOGNITION_MODEL])?;

    let detection_model = rten::Model::load_file(model_dir.join("text-detection.rten"))
        .map_err(|e| RecognizerError::ModelNotFound(format!("Failed to load detection model: {}", e)))?;
    let recognition_model = rten::Model::load_file(model_dir.join("text-recognition.rten"))
        .map_err(|e| {
            RecognizerError::ModelNotFound(format!("Failed to load recognition model: {}", e))
        })?;

    ocrs::OcrEngine::new(ocrs::OcrEngineParams {
        detection_model: Some(detection_model),
        recognition_model: Some(recognition_model),
        ..Default::default()
    })
    .map_err(|e| RecognizerError::OcrFailed(format!("Failed to create OCR engine: {}", e)))
}

fn run_ocrs(engine: &ocrs::OcrEngine, rgb: &image::RgbImage) -> Result<String, RecognizerError> {
    let img_source = ocrs::ImageSource::from_bytes(rgb.as_raw(), rgb.dimensions())
        .map_err(|e| RecognizerError::ImageError(format!("Failed to convert image: {}", e)))?;

    let input = engine
        .prepare_input(img_source)
        .map_err(|e| RecognizerError::OcrFailed(format!("Failed to prepare input: {}", e)))?;

    engine
        .get_text(&input)
        .map_err(|e| RecognizerError::OcrFailed(format!("Failed to extract text: {}", e)))
}

#[async_trait]
impl Recognizer for OcrsRecognizer {
    fn name(&self) -> &str {
        "ocrs"
    }

    fn is_available(&self) -> bool {
        // Models will be auto-downloaded on first use
        true
    }

    fn availability_hint(&self) -> String {
        MODEL_STORE.availability_hint(self.model_path.as_ref(), "OCRS", "12 MB")
    }

    async fn warm_up(&self) -> Result<(), RecognizerError> {
        self.engine().await.map(|_| ())
    }

    fn shutdown(&self) {
        if let Ok(mut slot) = self.engine.lock() {
            slot.take();
        }
    }

    async fn recognize(
        &self,
        variant: &ImageVariant,
        _mode: RecognizeMode,
    ) -> Result<Vec<Detection>, RecognizerError> {
        let engine = self.engine().await?;
        let rgb = variant.image.to_rgb8();

        let text = tokio::task::spawn_blocking(move || run_ocrs(&engine, &rgb))
            .await
            .map_err(|e| RecognizerError::OcrFailed(format!("OCRS task failed: {}", e)))??;

        Ok(text
            .lines()
            .flat_map(|line| runs_with_confidence(line, EXTRACTED_RUN_CONFIDENCE))
            .collect())
    }
}
