//! Tesseract OCR recognizer.
//!
//! Uses Tesseract via command-line with a digit-only whitelist. Every variant
//! is run once per page segmentation mode, twice per mode: TSV output gives
//! per-word confidences, plain text output is mined for digit runs.

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use image::ImageFormat;
use tokio::process::Command;

use super::backend::{Detection, RecognizeMode, Recognizer, RecognizerError};
use super::digits::{is_digit_string, runs_with_confidence, EXTRACTED_RUN_CONFIDENCE};
use super::model_utils::check_binary;
use crate::config::TesseractConfig;
use crate::preprocess::ImageVariant;

const DIGIT_WHITELIST: &str = "tessedit_char_whitelist=0123456789";

/// TSV level for word rows.
const TSV_WORD_LEVEL: &str = "5";

/// Tesseract OCR recognizer.
pub struct TesseractRecognizer {
    config: TesseractConfig,
}

impl TesseractRecognizer {
    /// Create a new Tesseract recognizer with default configuration.
    pub fn new() -> Self {
        Self {
            config: TesseractConfig::default(),
        }
    }

    /// Create a new Tesseract recognizer with custom configuration.
    pub fn with_config(config: TesseractConfig) -> Self {
        Self { config }
    }

    /// Page segmentation modes to run for `mode`.
    pub fn psm_modes(&self, mode: RecognizeMode) -> Vec<u8> {
        let mut modes = self.config.psm_modes.clone();
        if mode.is_enhanced() {
            modes.extend(
                self.config
                    .enhanced_psm_modes
                    .iter()
                    .filter(|psm| !self.config.psm_modes.contains(psm)),
            );
        }
        modes
    }

    /// Run Tesseract on an image file, optionally asking for TSV output.
    async fn run_tesseract(
        &self,
        image_path: &Path,
        psm: u8,
        tsv: bool,
    ) -> Result<String, RecognizerError> {
        let mut command = Command::new("tesseract");
        command
            .arg(image_path)
            .arg("stdout")
            .args(["-l", &self.config.language])
            .args(["--psm", &psm.to_string()])
            .args(["-c", DIGIT_WHITELIST]);
        if tsv {
            command.arg("tsv");
        }

        let output = command
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await;

        match output {
            Ok(output) => {
                if output.status.success() {
                    Ok(String::from_utf8_lossy(&output.stdout).to_string())
                } else {
                    let stderr = String::from_utf8_lossy(&output.stderr);
                    Err(RecognizerError::OcrFailed(format!(
                        "tesseract failed: {}",
                        stderr.trim()
                    )))
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(RecognizerError::NotAvailable(
                "tesseract not found (install tesseract-ocr)".to_string(),
            )),
            Err(e) => Err(RecognizerError::Io(e)),
        }
    }

    /// Detections for one segmentation mode.
    async fn recognize_with_psm(
        &self,
        image_path: &Path,
        psm: u8,
    ) -> Result<Vec<Detection>, RecognizerError> {
        let tsv = self.run_tesseract(image_path, psm, true).await?;
        let mut detections = parse_tsv_detections(&tsv);

        let text = self.run_tesseract(image_path, psm, false).await?;
        detections.extend(runs_with_confidence(&text, EXTRACTED_RUN_CONFIDENCE));
        Ok(detections)
    }
}

impl Default for TesseractRecognizer {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse word rows of Tesseract TSV output into digit detections.
///
/// Confidence is Tesseract's 0-100 word confidence scaled to 0-1. Rows with
/// a negative confidence or non-digit text are dropped.
pub fn parse_tsv_detections(tsv: &str) -> Vec<Detection> {
    tsv.lines()
        .skip(1)
        .filter_map(|row| {
            let cols: Vec<&str> = row.split('\t').collect();
            if cols.len() < 12 || cols[0] != TSV_WORD_LEVEL {
                return None;
            }
            let conf: f32 = cols[10].trim().parse().ok()?;
            let text = cols[11].trim();
            if conf < 0.0 || !is_digit_string(text) {
                return None;
            }
            Some(Detection::new(text, conf / 100.0))
        })
        .collect()
}

#[async_trait]
impl Recognizer for TesseractRecognizer {
    fn name(&self) -> &str {
        "tesseract"
    }

    fn is_available(&self) -> bool {
        check_binary("tesseract")
    }

    fn availability_hint(&self) -> String {
        if check_binary("tesseract") {
            "Tesseract is available".to_string()
        } else {
            "Tesseract not installed. Install with: apt install tesseract-ocr".to_string()
        }
    }

    async fn recognize(
        &self,
        variant: &ImageVariant,
        mode: RecognizeMode,
    ) -> Result<Vec<Detection>, RecognizerError> {
        let temp = tempfile::Builder::new()
            .prefix("tilesolver-")
            .suffix(".png")
            .tempfile()?;
        variant
            .image
            .save_with_format(temp.path(), ImageFormat::Png)
            .map_err(|e| RecognizerError::ImageError(format!("Failed to write variant: {}", e)))?;

        let mut detections = Vec::new();
        for psm in self.psm_modes(mode) {
            match self.recognize_with_psm(temp.path(), psm).await {
                Ok(found) => detections.extend(found),
                Err(e @ RecognizerError::NotAvailable(_)) => return Err(e),
                Err(e) => {
                    tracing::debug!("tesseract --psm {} failed on {}: {}", psm, variant.kind, e);
                }
            }
        }
        Ok(detections)
    }
}
