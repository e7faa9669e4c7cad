//! Tile batch orchestration.
//!
//! A batch is a target plus an ordered list of tiles. Each tile is decoded,
//! expanded into preprocessing variants, run through every pooled recognizer
//! and consolidated against the target, independently of the other tiles
//! and up to `workers` at a time. When no tile matches, the fallback policy
//! picks some anyway so the caller always gets a selection to submit.

mod decode;
mod events;
mod fallback;
mod types;

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{FallbackConfig, SolverConfig};
use crate::consolidate::Consolidator;
use crate::ocr::{PooledDetections, RecognizeMode, RecognizerPool};
use crate::preprocess::{ImageVariant, Preprocessor};
use crate::target::Target;

pub use decode::{decode_base64, decode_image_bytes, decode_payload, strip_data_uri, DecodeError};
pub use events::SolveEvent;
pub use fallback::select_fallback;
pub use types::{
    BatchResult, ImageReport, SolveError, SolveRequest, SolveResponse, Tile, TileError,
    TileInput, TilePayload, TileVerdict,
};

/// Solves digit-tile batches with a shared recognizer pool.
pub struct TileSolver {
    pool: Arc<RecognizerPool>,
    preprocessor: Arc<Preprocessor>,
    consolidator: Consolidator,
    fallback: FallbackConfig,
    workers: usize,
    event_tx: Option<mpsc::Sender<SolveEvent>>,
}

impl TileSolver {
    /// Create a solver around an already-built pool.
    pub fn new(pool: RecognizerPool, config: &SolverConfig) -> Self {
        Self {
            pool: Arc::new(pool),
            preprocessor: Arc::new(Preprocessor::new(config.preprocess.clone())),
            consolidator: Consolidator::new(config.similarity_threshold),
            fallback: config.fallback.clone(),
            workers: config.workers.max(1),
            event_tx: None,
        }
    }

    /// Create a solver with the recognizers named in `config`.
    pub fn from_config(config: &SolverConfig) -> Self {
        Self::new(RecognizerPool::from_config(config), config)
    }

    /// Send progress events to `event_tx`.
    pub fn with_events(mut self, event_tx: mpsc::Sender<SolveEvent>) -> Self {
        self.event_tx = Some(event_tx);
        self
    }

    pub fn pool(&self) -> &RecognizerPool {
        &self.pool
    }

    async fn emit(&self, event: SolveEvent) {
        if let Some(tx) = &self.event_tx {
            let _ = tx.send(event).await;
        }
    }

    /// Handle a wire request. Never fails; problems are reported in the response.
    pub async fn solve(&self, request: SolveRequest) -> SolveResponse {
        let total_tiles = request.tiles.len();
        let raw_target = request.target.unwrap_or_default();

        let target = match Target::new(&raw_target) {
            Ok(target) => target,
            Err(e) => {
                warn!("Rejecting solve request: {}", e);
                return SolveResponse::failure(raw_target, total_tiles, e.to_string());
            }
        };

        let tiles = request
            .tiles
            .into_iter()
            .enumerate()
            .map(|(position, input)| {
                if let Some(claimed) = input.index.filter(|&claimed| claimed != position) {
                    warn!(
                        "Tile at position {} claims index {}; using position",
                        position, claimed
                    );
                }
                Tile::from_base64(position, input.image_data.unwrap_or_default())
            })
            .collect();

        let mode = RecognizeMode::from_enhanced(request.enhanced_mode);
        match self.solve_batch(&target, tiles, mode).await {
            Ok(result) => SolveResponse::from_result(&target, &result),
            Err(e) => SolveResponse::failure(target.to_string(), total_tiles, e.to_string()),
        }
    }

    /// Solve a batch, giving up as soon as `cancel` fires.
    pub async fn solve_batch_with_cancel(
        &self,
        target: &Target,
        tiles: Vec<Tile>,
        mode: RecognizeMode,
        cancel: &CancellationToken,
    ) -> Result<BatchResult, SolveError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!("Batch for target {} cancelled", target);
                Err(SolveError::Cancelled)
            }
            result = self.solve_batch(target, tiles, mode) => result,
        }
    }

    /// Solve a batch of tiles against `target`.
    pub async fn solve_batch(
        &self,
        target: &Target,
        tiles: Vec<Tile>,
        mode: RecognizeMode,
    ) -> Result<BatchResult, SolveError> {
        if tiles.is_empty() {
            return Err(SolveError::InvalidRequest("no tiles supplied".to_string()));
        }

        let total_tiles = tiles.len();
        info!(
            "Solving {} tiles for target {} ({:?} mode, {} recognizers)",
            total_tiles,
            target,
            mode,
            self.pool.recognizers().len()
        );
        self.emit(SolveEvent::BatchStarted {
            total_tiles,
            target: target.to_string(),
        })
        .await;

        let outcomes: Vec<Result<TileVerdict, TileError>> = stream::iter(tiles)
            .map(|tile| async move {
                let index = tile.index;
                self.emit(SolveEvent::TileStarted { index }).await;
                let outcome = self.process_tile(tile, target, mode).await;
                match &outcome {
                    Ok(verdict) => {
                        self.emit(SolveEvent::TileProcessed {
                            index,
                            detections: verdict.detections.len(),
                            matched: verdict.is_match(),
                        })
                        .await;
                    }
                    Err(e) => {
                        warn!("Skipping tile {}: {}", index, e);
                        self.emit(SolveEvent::TileFailed {
                            index,
                            error: e.to_string(),
                        })
                        .await;
                    }
                }
                outcome
            })
            .buffer_unordered(self.workers)
            .collect()
            .await;

        let mut verdicts: Vec<TileVerdict> = outcomes.into_iter().filter_map(Result::ok).collect();
        verdicts.sort_by_key(|v| v.index);

        let processed_tiles = verdicts.len();
        let mut matching_indices: Vec<usize> = verdicts
            .iter()
            .filter(|v| v.is_match() && v.index < total_tiles)
            .map(|v| v.index)
            .collect();
        matching_indices.sort_unstable();
        matching_indices.dedup();

        let mut used_fallback = false;
        if matching_indices.is_empty() && processed_tiles > 0 {
            matching_indices = select_fallback(total_tiles, &self.fallback);
            used_fallback = true;
            warn!(
                "No tile matched {}; falling back to {} selection {:?}",
                target, self.fallback.policy, matching_indices
            );
            self.emit(SolveEvent::FallbackUsed {
                indices: matching_indices.clone(),
            })
            .await;
        } else if processed_tiles == 0 {
            warn!("None of the {} tiles could be decoded", total_tiles);
        }

        info!(
            "Target {}: matched {:?} ({} of {} tiles processed{})",
            target,
            matching_indices,
            processed_tiles,
            total_tiles,
            if used_fallback { ", fallback" } else { "" }
        );
        self.emit(SolveEvent::BatchComplete {
            matching: matching_indices.clone(),
            processed: processed_tiles,
            used_fallback,
        })
        .await;

        Ok(BatchResult {
            matching_indices,
            processed_tiles,
            total_tiles,
            used_fallback,
            verdicts,
        })
    }

    /// Decode one tile, recognize it and consolidate against `target`.
    pub async fn process_tile(
        &self,
        tile: Tile,
        target: &Target,
        mode: RecognizeMode,
    ) -> Result<TileVerdict, TileError> {
        let index = tile.index;
        let variants = self.prepare_variants(tile.payload).await?;
        let pooled = self.pool.recognize_all(variants, mode).await;

        let detections = pooled.into_candidates();
        let matches = self.consolidator.consolidate(&detections, target);
        debug!(
            "Tile {}: {} detections, matches {:?}",
            index,
            detections.len(),
            matches
        );

        Ok(TileVerdict {
            index,
            matches,
            detections,
        })
    }

    /// Run the per-tile pipeline on one image and report what every stage saw.
    pub async fn analyze_image(
        &self,
        payload: TilePayload,
        target: &Target,
        mode: RecognizeMode,
    ) -> Result<ImageReport, TileError> {
        let variants = self.prepare_variants(payload).await?;
        let variant_count = variants.len();
        let pooled: PooledDetections = self.pool.recognize_all(variants, mode).await;

        let total_detections = pooled.total();
        let per_recognizer = pooled.counts.clone();
        let detections = pooled.into_candidates();
        let matches = self.consolidator.consolidate(&detections, target);

        Ok(ImageReport {
            target: target.clone(),
            matches,
            total_detections,
            per_recognizer,
            variants: variant_count,
            ranked: Consolidator::rank(&detections),
        })
    }

    /// Decode and preprocess off the async runtime.
    async fn prepare_variants(&self, payload: TilePayload) -> Result<Vec<ImageVariant>, TileError> {
        let preprocessor = Arc::clone(&self.preprocessor);
        tokio::task::spawn_blocking(move || -> Result<Vec<ImageVariant>, TileError> {
            let image = decode_payload(&payload)?;
            Ok(preprocessor.variants(&image).collect())
        })
        .await
        .map_err(|e| TileError::Worker(e.to_string()))?
    }
}
