//! End-to-end batch solving with scripted recognizers.
//!
//! Each tile is a solid colour. The scripted recognizer looks up the colour
//! of the original variant and returns whatever detections the test assigned
//! to it, so the whole pipeline (decode, preprocess, pool, consolidate,
//! fallback) runs without any OCR engine installed.

use std::collections::HashMap;
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use image::{GrayImage, ImageFormat, Luma, Rgb, RgbImage};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use tilesolver::config::{FallbackPolicy, SolverConfig};
use tilesolver::ocr::{
    Detection, RecognizeMode, Recognizer, RecognizerError, RecognizerPool,
};
use tilesolver::preprocess::{ImageVariant, VariantKind};
use tilesolver::solver::{
    SolveError, SolveEvent, SolveRequest, Tile, TileInput, TileSolver,
};
use tilesolver::target::Target;

struct Scripted {
    outputs: HashMap<[u8; 3], Vec<Detection>>,
    delay: Option<Duration>,
}

impl Scripted {
    fn new(outputs: HashMap<[u8; 3], Vec<Detection>>) -> Self {
        Self {
            outputs,
            delay: None,
        }
    }
}

#[async_trait]
impl Recognizer for Scripted {
    fn name(&self) -> &str {
        "scripted"
    }

    fn is_available(&self) -> bool {
        true
    }

    fn availability_hint(&self) -> String {
        "always".to_string()
    }

    async fn recognize(
        &self,
        variant: &ImageVariant,
        _mode: RecognizeMode,
    ) -> Result<Vec<Detection>, RecognizerError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if variant.kind != VariantKind::Original {
            return Ok(Vec::new());
        }
        let pixel = variant.image.to_rgb8().get_pixel(0, 0).0;
        Ok(self.outputs.get(&pixel).cloned().unwrap_or_default())
    }
}

struct Broken;

#[async_trait]
impl Recognizer for Broken {
    fn name(&self) -> &str {
        "broken"
    }

    fn is_available(&self) -> bool {
        true
    }

    fn availability_hint(&self) -> String {
        String::new()
    }

    async fn recognize(
        &self,
        _variant: &ImageVariant,
        _mode: RecognizeMode,
    ) -> Result<Vec<Detection>, RecognizerError> {
        Err(RecognizerError::OcrFailed("engine crashed".to_string()))
    }
}

fn colour(index: usize) -> [u8; 3] {
    [10 + (index as u8) * 20, 90, 160]
}

fn tile_png(index: usize) -> Vec<u8> {
    let img = RgbImage::from_pixel(32, 32, Rgb(colour(index)));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png).unwrap();
    out.into_inner()
}

fn tile_base64(index: usize) -> String {
    base64::engine::general_purpose::STANDARD.encode(tile_png(index))
}

fn png_bytes(img: &GrayImage) -> Vec<u8> {
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png).unwrap();
    out.into_inner()
}

fn blank_tile(index: usize) -> Tile {
    Tile::from_bytes(index, png_bytes(&GrayImage::from_pixel(60, 60, Luma([255]))))
}

/// Dense dark strokes, enough ink and edges for the heuristic to guess digits.
fn inked_tile(index: usize) -> Tile {
    let img = GrayImage::from_fn(60, 60, |x, y| {
        if (x / 2 + y / 3) % 2 == 0 {
            Luma([0])
        } else {
            Luma([255])
        }
    });
    Tile::from_bytes(index, png_bytes(&img))
}

/// Pool built the way the CLI builds it, with no engine configured.
fn heuristic_only_solver() -> TileSolver {
    let config = SolverConfig {
        recognizers: Vec::new(),
        heuristic: true,
        ..SolverConfig::default()
    };
    TileSolver::from_config(&config)
}

fn tiles(count: usize) -> Vec<Tile> {
    (0..count).map(|i| Tile::from_base64(i, tile_base64(i))).collect()
}

/// Assign recognizer output texts by tile index; empty string means nothing.
fn script(texts: &[&str], confidence: f32) -> HashMap<[u8; 3], Vec<Detection>> {
    texts
        .iter()
        .enumerate()
        .filter(|(_, text)| !text.is_empty())
        .map(|(i, text)| (colour(i), vec![Detection::new(*text, confidence)]))
        .collect()
}

fn config() -> SolverConfig {
    SolverConfig {
        heuristic: false,
        recognizers: Vec::new(),
        ..SolverConfig::default()
    }
}

fn shared<R: Recognizer + 'static>(recognizer: R) -> Arc<dyn Recognizer> {
    Arc::new(recognizer)
}

fn solver_with(config: &SolverConfig, recognizers: Vec<Arc<dyn Recognizer>>) -> TileSolver {
    let mut pool = RecognizerPool::new(config.confidence_threshold, config.recognizer_timeout());
    for recognizer in recognizers {
        pool.register(recognizer);
    }
    TileSolver::new(pool, config)
}

fn scripted_solver(texts: &[&str]) -> TileSolver {
    solver_with(
        &config(),
        vec![shared(Scripted::new(script(texts, 0.9)))],
    )
}

fn target(s: &str) -> Target {
    Target::new(s).unwrap()
}

#[tokio::test]
async fn test_matches_exact_and_reversed_tiles() {
    let solver = scripted_solver(&["47", "74", "12", "47", "99"]);

    let result = solver
        .solve_batch(&target("47"), tiles(5), RecognizeMode::Standard)
        .await
        .unwrap();

    assert_eq!(result.matching_indices, vec![0, 1, 3]);
    assert!(!result.used_fallback);
    assert!(result.success());
    assert_eq!(result.processed_tiles, 5);
    assert_eq!(result.total_tiles, 5);
}

#[tokio::test]
async fn test_no_detections_falls_back() {
    let solver = scripted_solver(&[]);

    let result = solver
        .solve_batch(&target("8"), tiles(3), RecognizeMode::Standard)
        .await
        .unwrap();

    assert!(result.used_fallback);
    assert!(result.success());
    assert!(!result.matching_indices.is_empty());
    assert!(result.matching_indices.len() <= 3);
    assert!(result.matching_indices.windows(2).all(|w| w[0] < w[1]));
    assert!(result.matching_indices.iter().all(|&i| i < 3));
}

#[tokio::test]
async fn test_fallback_samples_whole_range() {
    let solver = scripted_solver(&[]);

    for _ in 0..10 {
        let result = solver
            .solve_batch(&target("8"), tiles(9), RecognizeMode::Standard)
            .await
            .unwrap();
        assert!(result.used_fallback);
        assert_eq!(result.matching_indices.len(), 3);
        assert!(result.matching_indices.windows(2).all(|w| w[0] < w[1]));
        assert!(result.matching_indices.iter().all(|&i| i < 9));
    }
}

#[tokio::test]
async fn test_lowest_index_fallback_is_deterministic() {
    let mut config = config();
    config.fallback.policy = FallbackPolicy::LowestIndex;
    let solver = solver_with(&config, vec![shared(Scripted::new(HashMap::new()))]);

    let result = solver
        .solve_batch(&target("8"), tiles(6), RecognizeMode::Standard)
        .await
        .unwrap();

    assert_eq!(result.matching_indices, vec![0, 1, 2]);
    assert!(result.used_fallback);
}

#[tokio::test]
async fn test_corrupt_tile_is_excluded() {
    let solver = scripted_solver(&["47", "", "", "47"]);
    let mut batch = tiles(4);
    batch[2] = Tile::from_base64(2, "bm90IGFuIGltYWdl");

    let result = solver
        .solve_batch(&target("47"), batch, RecognizeMode::Standard)
        .await
        .unwrap();

    assert_eq!(result.processed_tiles, 3);
    assert_eq!(result.total_tiles, 4);
    assert_eq!(result.matching_indices, vec![0, 3]);
    assert!(!result.used_fallback);
}

#[tokio::test]
async fn test_all_tiles_corrupt_reports_failure() {
    let solver = scripted_solver(&["47"]);
    let batch = vec![
        Tile::from_base64(0, "!!!"),
        Tile::from_bytes(1, b"plain text".to_vec()),
    ];

    let result = solver
        .solve_batch(&target("47"), batch, RecognizeMode::Standard)
        .await
        .unwrap();

    assert_eq!(result.processed_tiles, 0);
    assert!(!result.used_fallback);
    assert!(!result.success());
}

#[tokio::test]
async fn test_fuzzy_boundary_through_pipeline() {
    let solver = scripted_solver(&["1235", "1234"]);

    let result = solver
        .solve_batch(&target("1234"), tiles(2), RecognizeMode::Standard)
        .await
        .unwrap();
    assert_eq!(result.matching_indices, vec![1]);
    assert!(!result.used_fallback);

    let solver = scripted_solver(&["1235"]);
    let result = solver
        .solve_batch(&target("1234"), tiles(1), RecognizeMode::Standard)
        .await
        .unwrap();
    // 0.75 similarity is below 0.8, so only the fallback picks the tile.
    assert!(result.used_fallback);
}

#[tokio::test]
async fn test_low_confidence_detections_are_ignored() {
    let solver = solver_with(
        &config(),
        vec![shared(Scripted::new(script(&["47", "47"], 0.3)))],
    );

    let result = solver
        .solve_batch(&target("47"), tiles(2), RecognizeMode::Standard)
        .await
        .unwrap();

    assert!(result.used_fallback);
}

#[tokio::test]
async fn test_failing_recognizer_is_absorbed() {
    let solver = solver_with(
        &config(),
        vec![
            shared(Broken),
            shared(Scripted::new(script(&["", "47"], 0.9))),
        ],
    );

    let result = solver
        .solve_batch(&target("47"), tiles(2), RecognizeMode::Standard)
        .await
        .unwrap();

    assert_eq!(result.matching_indices, vec![1]);
    assert_eq!(result.processed_tiles, 2);
}

#[tokio::test]
async fn test_empty_batch_is_invalid() {
    let solver = scripted_solver(&[]);

    let err = solver
        .solve_batch(&target("47"), Vec::new(), RecognizeMode::Standard)
        .await
        .unwrap_err();
    assert!(matches!(err, SolveError::InvalidRequest(_)));
}

#[tokio::test]
async fn test_wire_request_strips_data_uri() {
    let solver = scripted_solver(&["12", "47", "99"]);
    let request = SolveRequest {
        target: Some("47".to_string()),
        tiles: (0..3)
            .map(|i| TileInput {
                index: Some(i),
                image_data: Some(format!("data:image/png;base64,{}", tile_base64(i))),
            })
            .collect(),
        enhanced_mode: false,
    };

    let response = solver.solve(request).await;

    assert_eq!(response.target, "47");
    assert_eq!(response.matching_indices, vec![1]);
    assert_eq!(response.processed_tiles, 3);
    assert_eq!(response.total_tiles, 3);
    assert!(response.success);
    assert!(!response.used_fallback);
    assert!(response.error.is_none());
}

#[tokio::test]
async fn test_wire_request_from_json() {
    let solver = scripted_solver(&["", "", "47"]);
    let json = serde_json::json!({
        "target": "47",
        "enhancedMode": true,
        "tiles": [
            {"index": 0, "imageData": tile_base64(0)},
            {"index": 1},
            {"index": 2, "base64Image": tile_base64(2)},
        ]
    });
    let request: SolveRequest = serde_json::from_value(json).unwrap();

    let response = solver.solve(request).await;

    assert_eq!(response.matching_indices, vec![2]);
    assert_eq!(response.processed_tiles, 2);
    assert_eq!(response.total_tiles, 3);
}

#[tokio::test]
async fn test_wire_request_rejects_bad_input() {
    let solver = scripted_solver(&[]);

    let response = solver
        .solve(SolveRequest {
            target: Some("47".to_string()),
            tiles: Vec::new(),
            enhanced_mode: false,
        })
        .await;
    assert!(!response.success);
    assert!(response.error.is_some());
    assert!(response.matching_indices.is_empty());

    let response = solver
        .solve(SolveRequest {
            target: None,
            tiles: vec![TileInput {
                index: Some(0),
                image_data: Some(tile_base64(0)),
            }],
            enhanced_mode: false,
        })
        .await;
    assert!(!response.success);
    assert_eq!(response.total_tiles, 1);
    assert!(response.error.is_some());
}

#[tokio::test]
async fn test_events_are_emitted() {
    let (tx, mut rx) = mpsc::channel(100);
    let solver = scripted_solver(&["47", "12"]).with_events(tx);

    solver
        .solve_batch(&target("47"), tiles(2), RecognizeMode::Standard)
        .await
        .unwrap();
    drop(solver);

    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }

    assert!(matches!(
        events.first(),
        Some(SolveEvent::BatchStarted { total_tiles: 2, .. })
    ));
    assert_eq!(
        events.last(),
        Some(&SolveEvent::BatchComplete {
            matching: vec![0],
            processed: 2,
            used_fallback: false,
        })
    );
    let processed = events
        .iter()
        .filter(|e| matches!(e, SolveEvent::TileProcessed { .. }))
        .count();
    assert_eq!(processed, 2);
}

#[tokio::test]
async fn test_tile_events_are_sent_as_tiles_finish() {
    let (tx, mut rx) = mpsc::channel(100);
    let config = SolverConfig {
        workers: 1,
        ..config()
    };
    let recognizer = Scripted {
        outputs: script(&["47", "12", "99"], 0.9),
        delay: Some(Duration::from_millis(5)),
    };
    let solver = solver_with(&config, vec![shared(recognizer)]).with_events(tx);

    solver
        .solve_batch(&target("47"), tiles(3), RecognizeMode::Standard)
        .await
        .unwrap();
    drop(solver);

    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }

    let processed_first = events
        .iter()
        .position(|e| matches!(e, SolveEvent::TileProcessed { index: 0, .. }))
        .unwrap();
    let started_last = events
        .iter()
        .position(|e| matches!(e, SolveEvent::TileStarted { index: 2 }))
        .unwrap();
    assert!(processed_first < started_last);
}

#[tokio::test]
async fn test_heuristic_only_blank_tiles_fall_back() {
    let solver = heuristic_only_solver();
    assert!(!solver.pool().is_empty());
    assert!(!solver.pool().has_engines());

    let batch = (0..3).map(blank_tile).collect();
    let result = solver
        .solve_batch(&target("47"), batch, RecognizeMode::Standard)
        .await
        .unwrap();

    assert_eq!(result.processed_tiles, 3);
    assert!(result.used_fallback);
    assert!(result.success());
}

#[tokio::test]
async fn test_heuristic_only_inked_tile_matches() {
    let solver = heuristic_only_solver();
    let batch = vec![blank_tile(0), inked_tile(1), blank_tile(2)];

    // Every single-digit guess is contained in this target.
    let result = solver
        .solve_batch(&target("0123456789"), batch, RecognizeMode::Standard)
        .await
        .unwrap();

    assert_eq!(result.matching_indices, vec![1]);
    assert!(!result.used_fallback);
    assert!(result.verdicts[1].detections.iter().all(|d| d.text.len() == 1));
}

#[tokio::test]
async fn test_cancelled_batch_returns_promptly() {
    let recognizer = Scripted {
        outputs: script(&["47"], 0.9),
        delay: Some(Duration::from_secs(5)),
    };
    let solver = solver_with(&config(), vec![shared(recognizer)]);
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let started = std::time::Instant::now();
    let err = solver
        .solve_batch_with_cancel(&target("47"), tiles(1), RecognizeMode::Standard, &cancel)
        .await
        .unwrap_err();

    assert!(matches!(err, SolveError::Cancelled));
    assert!(started.elapsed() < Duration::from_secs(4));
}

#[tokio::test]
async fn test_analyze_image_reports_counts() {
    let solver = scripted_solver(&["47"]);

    let report = solver
        .analyze_image(
            tilesolver::solver::TilePayload::Bytes(tile_png(0)),
            &target("47"),
            RecognizeMode::Standard,
        )
        .await
        .unwrap();

    assert!(report.is_match());
    assert_eq!(report.matches, vec!["47".to_string()]);
    assert_eq!(report.total_detections, 1);
    assert_eq!(report.per_recognizer.get("scripted"), Some(&1));
    assert_eq!(report.variants, 8);
}
