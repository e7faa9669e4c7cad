//! Solver inputs, outputs and errors.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::decode::DecodeError;
use crate::consolidate::RankedText;
use crate::ocr::Detection;
use crate::target::Target;

#[derive(Debug, Error)]
pub enum SolveError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Solve cancelled")]
    Cancelled,
}

/// Per-tile failure. Absorbed by the orchestrator.
#[derive(Debug, Error)]
pub enum TileError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("Tile worker failed: {0}")]
    Worker(String),
}

/// Raw image source for one tile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TilePayload {
    /// Base64 text, optionally carrying a `data:...;base64,` prefix.
    Base64(String),
    /// Encoded image bytes (PNG, JPEG, ...).
    Bytes(Vec<u8>),
}

/// One candidate image and its position in the batch.
#[derive(Debug, Clone)]
pub struct Tile {
    pub index: usize,
    pub payload: TilePayload,
}

impl Tile {
    pub fn new(index: usize, payload: TilePayload) -> Self {
        Self { index, payload }
    }

    pub fn from_base64(index: usize, data: impl Into<String>) -> Self {
        Self::new(index, TilePayload::Base64(data.into()))
    }

    pub fn from_bytes(index: usize, bytes: Vec<u8>) -> Self {
        Self::new(index, TilePayload::Bytes(bytes))
    }
}

/// Outcome for one successfully processed tile.
#[derive(Debug, Clone)]
pub struct TileVerdict {
    pub index: usize,
    /// Matching texts, most confident first.
    pub matches: Vec<String>,
    /// Detections that went into consolidation.
    pub detections: Vec<Detection>,
}

impl TileVerdict {
    pub fn is_match(&self) -> bool {
        !self.matches.is_empty()
    }
}

/// Result of one batch.
#[derive(Debug, Clone, Default)]
pub struct BatchResult {
    /// Ascending, no duplicates, every element below `total_tiles`.
    pub matching_indices: Vec<usize>,
    pub processed_tiles: usize,
    pub total_tiles: usize,
    pub used_fallback: bool,
    /// Verdicts for processed tiles, in index order.
    pub verdicts: Vec<TileVerdict>,
}

impl BatchResult {
    pub fn success(&self) -> bool {
        !self.matching_indices.is_empty()
    }
}

/// Single-image diagnostic report.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageReport {
    pub target: Target,
    pub matches: Vec<String>,
    pub total_detections: usize,
    pub per_recognizer: BTreeMap<String, usize>,
    pub variants: usize,
    pub ranked: Vec<RankedText>,
}

impl ImageReport {
    pub fn is_match(&self) -> bool {
        !self.matches.is_empty()
    }
}

/// Batch solve request as sent by the automation client.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SolveRequest {
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default)]
    pub tiles: Vec<TileInput>,
    #[serde(default)]
    pub enhanced_mode: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TileInput {
    #[serde(default)]
    pub index: Option<usize>,
    #[serde(default, alias = "base64Image")]
    pub image_data: Option<String>,
}

/// Batch solve response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SolveResponse {
    pub target: String,
    pub matching_indices: Vec<usize>,
    pub processed_tiles: usize,
    pub total_tiles: usize,
    pub success: bool,
    pub used_fallback: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SolveResponse {
    pub fn from_result(target: &Target, result: &BatchResult) -> Self {
        let error = if result.success() {
            None
        } else {
            Some(format!(
                "none of the {} tiles could be decoded",
                result.total_tiles
            ))
        };

        Self {
            target: target.to_string(),
            matching_indices: result.matching_indices.clone(),
            processed_tiles: result.processed_tiles,
            total_tiles: result.total_tiles,
            success: result.success(),
            used_fallback: result.used_fallback,
            error,
        }
    }

    pub fn failure(target: impl Into<String>, total_tiles: usize, error: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            matching_indices: Vec::new(),
            processed_tiles: 0,
            total_tiles,
            success: false,
            used_fallback: false,
            error: Some(error.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_accepts_both_payload_names() {
        let request: SolveRequest = serde_json::from_str(
            r#"{"target":"47","tiles":[{"index":0,"imageData":"aaa"},{"index":1,"base64Image":"bbb"}]}"#,
        )
        .unwrap();
        assert_eq!(request.target.as_deref(), Some("47"));
        assert!(!request.enhanced_mode);
        assert_eq!(request.tiles[0].image_data.as_deref(), Some("aaa"));
        assert_eq!(request.tiles[1].image_data.as_deref(), Some("bbb"));
    }

    #[test]
    fn test_request_defaults() {
        let request: SolveRequest = serde_json::from_str("{}").unwrap();
        assert!(request.target.is_none());
        assert!(request.tiles.is_empty());
    }

    #[test]
    fn test_response_wire_names() {
        let target = Target::new("47").unwrap();
        let result = BatchResult {
            matching_indices: vec![0, 3],
            processed_tiles: 5,
            total_tiles: 5,
            used_fallback: false,
            verdicts: Vec::new(),
        };
        let json = serde_json::to_value(SolveResponse::from_result(&target, &result)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "target": "47",
                "matchingIndices": [0, 3],
                "processedTiles": 5,
                "totalTiles": 5,
                "success": true,
                "usedFallback": false
            })
        );
    }
}
