//! Digit-run extraction shared by the engines.

use std::sync::LazyLock;

use regex::Regex;

use super::backend::Detection;

/// Confidence given to digit runs pulled out of plain engine text.
pub const EXTRACTED_RUN_CONFIDENCE: f32 = 0.8;

/// Shortest digit run worth reporting from engine text.
pub const MIN_RUN_LEN: usize = 2;

static DIGIT_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+").unwrap());

/// All maximal digit runs of at least `MIN_RUN_LEN` characters.
pub fn digit_runs(text: &str) -> impl Iterator<Item = &str> {
    DIGIT_RUN
        .find_iter(text)
        .map(|m| m.as_str())
        .filter(|run| run.len() >= MIN_RUN_LEN)
}

/// Digit runs in `text`, each reported with `confidence`.
pub fn runs_with_confidence(text: &str, confidence: f32) -> Vec<Detection> {
    digit_runs(text)
        .map(|run| Detection::new(run, confidence))
        .collect()
}

/// True when `text` is non-empty and every character is an ASCII digit.
pub fn is_digit_string(text: &str) -> bool {
    !text.is_empty() && text.bytes().all(|b| b.is_ascii_digit())
}

/// Drop engine detections whose confidence is below `threshold`.
pub fn retain_confident(detections: &mut Vec<Detection>, threshold: f32) {
    detections.retain(|d| d.confidence >= threshold);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digit_runs_skip_single_digits() {
        let runs: Vec<_> = digit_runs("tile 7 shows 47 and 120x").collect();
        assert_eq!(runs, vec!["47", "120"]);
    }

    #[test]
    fn test_runs_with_confidence() {
        let detections = runs_with_confidence("\n 47 \n", EXTRACTED_RUN_CONFIDENCE);
        assert_eq!(detections, vec![Detection::new("47", 0.8)]);
    }

    #[test]
    fn test_is_digit_string() {
        assert!(is_digit_string("0047"));
        assert!(!is_digit_string(""));
        assert!(!is_digit_string("4 7"));
        assert!(!is_digit_string("4a"));
    }

    #[test]
    fn test_retain_confident_keeps_boundary() {
        let mut detections = vec![
            Detection::new("11", 0.49),
            Detection::new("22", 0.5),
            Detection::new("33", 0.9),
        ];
        retain_confident(&mut detections, 0.5);
        let texts: Vec<_> = detections.iter().map(|d| d.text.as_str()).collect();
        assert_eq!(texts, vec!["22", "33"]);
    }
}
