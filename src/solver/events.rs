//! Solver progress events.

/// Events emitted while a batch is being solved.
#[derive(Debug, Clone, PartialEq)]
pub enum SolveEvent {
    /// Batch accepted and about to be processed
    BatchStarted { total_tiles: usize, target: String },
    /// Tile decode/recognition started
    TileStarted { index: usize },
    /// Tile ran through the full pipeline
    TileProcessed {
        index: usize,
        detections: usize,
        matched: bool,
    },
    /// Tile could not be decoded and was excluded
    TileFailed { index: usize, error: String },
    /// No tile matched; these indices were picked instead
    FallbackUsed { indices: Vec<usize> },
    /// Batch finished
    BatchComplete {
        matching: Vec<usize>,
        processed: usize,
        used_fallback: bool,
    },
}
