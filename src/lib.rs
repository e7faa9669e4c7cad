//! tilesolver - digit-tile image CAPTCHA solver.
//!
//! Given a target number and a grid of tile images, finds the tiles that
//! show the target. Every tile is expanded into several preprocessed
//! variants, read by a pool of OCR recognizers, and the pooled detections
//! are consolidated against the target. When nothing matches, a fallback
//! policy still picks some tiles.
//!
//! A default build registers tesseract (an external binary) plus the
//! heuristic scan. The second independent engine, PaddleOCR, needs
//! `--features ocr-paddle`; `ocr-ocrs` adds ocrs and `ocr-all` enables both.

pub mod config;
pub mod consolidate;
pub mod ocr;
pub mod preprocess;
pub mod solver;
pub mod target;

pub use config::SolverConfig;
pub use solver::{BatchResult, SolveRequest, SolveResponse, Tile, TileSolver};
pub use target::{extract_target, Target};
