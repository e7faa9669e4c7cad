//! PaddleOCR recognizer.
//!
//! Uses paddle-ocr-rs for OCR via ONNX Runtime. Each detected text region
//! comes back with its own recognition score, which is kept as the
//! confidence of every digit run found in that region.
//!
//! Models are automatically downloaded on first use from:
//! https://github.com/RapidAI/RapidOCR

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use image::ImageFormat;
use paddle_ocr_rs::ocr_lite::OcrLite;

use super::backend::{Detection, RecognizeMode, Recognizer, RecognizerError};
use super::digits::runs_with_confidence;
use super::model_utils::{ModelSpec, ModelStore};
use crate::preprocess::ImageVariant;

const MODEL_STORE: ModelStore = ModelStore {
    subdir: "paddle-ocr",
    required_files: &[DET_MODEL_NAME, REC_MODEL_NAME, CLS_MODEL_NAME],
};

const DET_MODEL_NAME: &str = "ch_PP-OCRv4_det_infer.onnx";
const REC_MODEL_NAME: &str = "ch_PP-OCRv4_rec_infer.onnx";
const CLS_MODEL_NAME: &str = "ch_ppocr_mobile_v2.0_cls_infer.onnx";

const DET_MODEL: ModelSpec = ModelSpec {
    url: "https://huggingface.co/SWHL/RapidOCR/resolve/main/PP-OCRv4/ch_PP-OCRv4_det_infer.onnx",
    filename: DET_MODEL_NAME,
    size_hint: "4 MB",
};

const REC_MODEL: ModelSpec = ModelSpec {
    url: "https://huggingface.co/SWHL/RapidOCR/resolve/main/PP-OCRv4/ch_PP-OCRv4_rec_infer.onnx",
    filename: REC_MODEL_NAME,
    size_hint: "10 MB",
};

const CLS_MODEL: ModelSpec = ModelSpec {
    url: "https://www.modelscope.cn/models/RapidAI/RapidOCR/resolve/v3.4.0/onnx/PP-OCRv4/cls/ch_ppocr_mobile_v2.0_cls_infer.onnx",
    filename: CLS_MODEL_NAME,
    size_hint: "1 MB",
};

const NUM_THREADS: usize = 2;

/// Tiles are small; padding gives the detector some margin around the glyphs.
const PADDING: u32 = 50;
const MAX_SIDE_LEN: u32 = 1024;
const BOX_SCORE_THRESH: f32 = 0.5;
const BOX_THRESH: f32 = 0.3;
const UNCLIP_RATIO: f32 = 1.6;

/// PaddleOCR recognizer via ONNX Runtime.
///
/// The engine is loaded lazily (or by `warm_up`) into a slot owned by this
/// recognizer and dropped again by `shutdown`.
pub struct PaddleRecognizer {
    model_path: Option<PathBuf>,
    engine: Arc<Mutex<Option<OcrLite>>>,
}

impl PaddleRecognizer {
    pub fn new() -> Self {
        Self::with_model_path(None)
    }

    pub fn with_model_path(model_path: Option<PathBuf>) -> Self {
        Self {
            model_path,
            engine: Arc::new(Mutex::new(None)),
        }
    }
}

impl Default for PaddleRecognizer {
    fn default() -> Self {
        Self::new()
    }
}

/// Locate (or download) the models and initialize an engine.
fn load_engine(model_path: Option<&PathBuf>) -> Result<OcrLite, RecognizerError> {
    let model_dir = MODEL_STORE.ensure(model_path, &[&DET_MODEL, &REC_MODEL, &CLS_MODEL])?;

    let det_model = model_dir.join(DET_MODEL_NAME);
    let cls_model = model_dir.join(CLS_MODEL_NAME);
    let rec_model = model_dir.join(REC_MODEL_NAME);

    let mut ocr = OcrLite::new();
    ocr.init_models(
        &det_model.to_string_lossy(),
        &cls_model.to_string_lossy(),
        &rec_model.to_string_lossy(),
        NUM_THREADS,
    )
    .map_err(|e| RecognizerError::OcrFailed(format!("Failed to init PaddleOCR: {}", e)))?;
    Ok(ocr)
}

/// Run detection + recognition on an image file.
fn run_paddle(
    engine: &Mutex<Option<OcrLite>>,
    model_path: Option<&PathBuf>,
    image_path: &Path,
) -> Result<Vec<Detection>, RecognizerError> {
    let mut slot = engine
        .lock()
        .map_err(|e| RecognizerError::OcrFailed(format!("Failed to lock PaddleOCR engine: {}", e)))?;
    if slot.is_none() {
        *slot = Some(load_engine(model_path)?);
    }
    let ocr = slot
        .as_mut()
        .ok_or_else(|| RecognizerError::OcrFailed("PaddleOCR engine not initialized".to_string()))?;

    let path = image_path
        .to_str()
        .ok_or_else(|| RecognizerError::ImageError("Non UTF-8 temp path".to_string()))?;
    let result = ocr
        .detect_from_path(
            path,
            PADDING,
            MAX_SIDE_LEN,
            BOX_SCORE_THRESH,
            BOX_THRESH,
            UNCLIP_RATIO,
            false,
            false,
        )
        .map_err(|e| RecognizerError::OcrFailed(format!("PaddleOCR detection failed: {}", e)))?;

    Ok(result
        .text_blocks
        .iter()
        .flat_map(|block| runs_with_confidence(&block.text, block.text_score as f32))
        .collect())
}

#[async_trait]
impl Recognizer for PaddleRecognizer {
    fn name(&self) -> &str {
        "paddleocr"
    }

    fn is_available(&self) -> bool {
        // Models will be auto-downloaded on first use
        true
    }

    fn availability_hint(&self) -> String {
        MODEL_STORE.availability_hint(self.model_path.as_ref(), "PaddleOCR", "15 MB")
    }

    async fn warm_up(&self) -> Result<(), RecognizerError> {
        let engine = Arc::clone(&self.engine);
        let model_path = self.model_path.clone();
        tokio::task::spawn_blocking(move || {
            let mut slot = engine.lock().map_err(|e| {
                RecognizerError::OcrFailed(format!("Failed to lock PaddleOCR engine: {}", e))
            })?;
            if slot.is_none() {
                *slot = Some(load_engine(model_path.as_ref())?);
            }
            Ok(())
        })
        .await
        .map_err(|e| RecognizerError::OcrFailed(format!("PaddleOCR warm-up task failed: {}", e)))?
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
        let temp = tempfile::Builder::new()
            .prefix("tilesolver-")
            .suffix(".png")
            .tempfile()?;
        variant
            .image
            .save_with_format(temp.path(), ImageFormat::Png)
            .map_err(|e| RecognizerError::ImageError(format!("Failed to write variant: {}", e)))?;

        let engine = Arc::clone(&self.engine);
        let model_path = self.model_path.clone();
        tokio::task::spawn_blocking(move || run_paddle(&engine, model_path.as_ref(), temp.path()))
            .await
            .map_err(|e| RecognizerError::OcrFailed(format!("PaddleOCR task failed: {}", e)))?
    }
}
