//! Dark-pixel density heuristic.
//!
//! This is not a recognizer in any meaningful sense. It slides a window over
//! the grayscale image, flags windows whose ink density and edge count look
//! vaguely digit-like, and emits a single-digit guess derived from the
//! density. Expect noise, not precision. It exists so that a machine with no
//! OCR engine installed still produces some signal, and its output is only
//! consulted when every engine came back empty for a tile.

use async_trait::async_trait;
use image::GrayImage;

use super::backend::{Detection, RecognizeMode, Recognizer, RecognizerError, RecognizerKind};
use crate::preprocess::ImageVariant;

/// Confidence attached to every heuristic guess.
pub const HEURISTIC_CONFIDENCE: f32 = 0.3;

/// Sliding-window digit-likeness scan.
#[derive(Debug, Clone)]
pub struct HeuristicRecognizer {
    window_width: u32,
    window_height: u32,
    step: u32,
    /// Pixels darker than this count as ink.
    ink_cutoff: u8,
    min_ink_ratio: f32,
    max_ink_ratio: f32,
    min_transitions: usize,
    max_guesses: usize,
}

impl Default for HeuristicRecognizer {
    fn default() -> Self {
        Self {
            window_width: 15,
            window_height: 20,
            step: 5,
            ink_cutoff: 200,
            min_ink_ratio: 0.1,
            max_ink_ratio: 0.7,
            min_transitions: 5,
            max_guesses: 16,
        }
    }
}

impl HeuristicRecognizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scan a grayscale image and return one guess per digit-like window.
    pub fn scan(&self, gray: &GrayImage) -> Vec<Detection> {
        let (width, height) = gray.dimensions();
        if width <= self.window_width || height <= self.window_height {
            return Vec::new();
        }

        let mut guesses = Vec::new();
        let mut y = 0;
        while y < height - self.window_height {
            let mut x = 0;
            while x < width - self.window_width {
                if let Some(guess) = self.inspect_window(gray, x, y) {
                    guesses.push(guess);
                    if guesses.len() >= self.max_guesses {
                        return guesses;
                    }
                }
                x += self.step;
            }
            y += self.step;
        }
        guesses
    }

    fn inspect_window(&self, gray: &GrayImage, x0: u32, y0: u32) -> Option<Detection> {
        let area = (self.window_width * self.window_height) as f32;
        let mut ink = 0u32;
        let mut vertical = 0usize;
        let mut horizontal = 0usize;

        for y in y0..y0 + self.window_height {
            for x in x0..x0 + self.window_width {
                let value = gray.get_pixel(x, y)[0];
                if value < self.ink_cutoff {
                    ink += 1;
                }
                if y + 1 < y0 + self.window_height && gray.get_pixel(x, y + 1)[0] != value {
                    vertical += 1;
                }
                if x + 1 < x0 + self.window_width && gray.get_pixel(x + 1, y)[0] != value {
                    horizontal += 1;
                }
            }
        }

        let ratio = ink as f32 / area;
        if ratio <= self.min_ink_ratio || ratio >= self.max_ink_ratio {
            return None;
        }
        if vertical <= self.min_transitions || horizontal <= self.min_transitions {
            return None;
        }

        // Map the density band onto 0-9. Arbitrary, but deterministic.
        let position = (ratio - self.min_ink_ratio) / (self.max_ink_ratio - self.min_ink_ratio);
        let digit = ((position * 10.0) as u32).min(9);
        Some(Detection::new(digit.to_string(), HEURISTIC_CONFIDENCE))
    }
}

#[async_trait]
impl Recognizer for HeuristicRecognizer {
    fn name(&self) -> &str {
        "heuristic"
    }

    fn kind(&self) -> RecognizerKind {
        RecognizerKind::Heuristic
    }

    fn is_available(&self) -> bool {
        true
    }

    fn availability_hint(&self) -> String {
        "Heuristic scan is always available (low confidence)".to_string()
    }

    async fn recognize(
        &self,
        variant: &ImageVariant,
        _mode: RecognizeMode,
    ) -> Result<Vec<Detection>, RecognizerError> {
        Ok(self.scan(&variant.image.to_luma8()))
    }
}
