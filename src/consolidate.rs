//! Detection consolidation.
//!
//! Merges every detection pooled for one tile into the list of texts that
//! match the target. Texts are ranked by average confidence; exact,
//! substring and reversed matches are tried first, and only when none of
//! those hit does an equal-length Hamming comparison get a chance.

use std::collections::HashMap;

use serde::Serialize;

use crate::ocr::Detection;
use crate::target::Target;

/// One distinct text with its averaged confidence.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedText {
    pub text: String,
    pub confidence: f32,
    pub occurrences: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct Consolidator {
    similarity_threshold: f32,
}

impl Default for Consolidator {
    fn default() -> Self {
        Self::new(0.8)
    }
}

impl Consolidator {
    pub fn new(similarity_threshold: f32) -> Self {
        Self {
            similarity_threshold,
        }
    }

    pub fn similarity_threshold(&self) -> f32 {
        self.similarity_threshold
    }

    /// Group detections by text and sort by descending average confidence.
    ///
    /// Ties keep a stable order by text. Empty texts are dropped.
    pub fn rank(detections: &[Detection]) -> Vec<RankedText> {
        let mut groups: HashMap<&str, (f32, usize)> = HashMap::new();
        for detection in detections.iter().filter(|d| !d.text.is_empty()) {
            let entry = groups.entry(detection.text.as_str()).or_default();
            entry.0 += detection.confidence;
            entry.1 += 1;
        }

        let mut ranked: Vec<RankedText> = groups
            .into_iter()
            .map(|(text, (sum, count))| RankedText {
                text: text.to_string(),
                confidence: sum / count as f32,
                occurrences: count,
            })
            .collect();

        ranked.sort_by(|a, b| {
            b.confidence
                .total_cmp(&a.confidence)
                .then_with(|| a.text.cmp(&b.text))
        });
        ranked
    }

    /// Texts matching `target`, most confident first. Empty means no match.
    pub fn consolidate(&self, detections: &[Detection], target: &Target) -> Vec<String> {
        let ranked = Self::rank(detections);
        if ranked.is_empty() {
            return Vec::new();
        }

        let exact: Vec<String> = ranked
            .iter()
            .filter(|r| matches_directly(&r.text, target.as_str()))
            .map(|r| r.text.clone())
            .collect();
        if !exact.is_empty() {
            return exact;
        }

        ranked
            .into_iter()
            .filter(|r| {
                hamming_similarity(&r.text, target.as_str())
                    .is_some_and(|similarity| similarity >= self.similarity_threshold)
            })
            .map(|r| r.text)
            .collect()
    }

    pub fn matches(&self, detections: &[Detection], target: &Target) -> bool {
        !self.consolidate(detections, target).is_empty()
    }
}

/// Equal, either one containing the other, or `text` reversed equals `target`.
pub fn matches_directly(text: &str, target: &str) -> bool {
    if text.is_empty() || target.is_empty() {
        return false;
    }
    text == target
        || text.contains(target)
        || target.contains(text)
        || text.chars().rev().eq(target.chars())
}

/// `1 - mismatches / len` for equal-length strings, `None` otherwise.
pub fn hamming_similarity(text: &str, target: &str) -> Option<f32> {
    let len = target.chars().count();
    if len == 0 || text.chars().count() != len {
        return None;
    }
    let mismatches = text
        .chars()
        .zip(target.chars())
        .filter(|(a, b)| a != b)
        .count();
    Some(1.0 - mismatches as f32 / len as f32)
}
