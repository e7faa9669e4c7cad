//! Best-effort tile selection when nothing matched.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::{FallbackConfig, FallbackPolicy};

/// Pick up to `config.max_picks` indices from `0..total_tiles`, ascending.
///
/// Returns an empty list only when `total_tiles` is zero.
pub fn select_fallback(total_tiles: usize, config: &FallbackConfig) -> Vec<usize> {
    let picks = config.max_picks.max(1).min(total_tiles);
    if picks == 0 {
        return Vec::new();
    }

    match config.policy {
        FallbackPolicy::LowestIndex => (0..picks).collect(),
        FallbackPolicy::Random => match config.seed {
            Some(seed) => sample(&mut StdRng::seed_from_u64(seed), total_tiles, picks),
            None => sample(&mut rand::thread_rng(), total_tiles, picks),
        },
    }
}

fn sample<R: Rng + ?Sized>(rng: &mut R, total_tiles: usize, picks: usize) -> Vec<usize> {
    let mut indices = rand::seq::index::sample(rng, total_tiles, picks).into_vec();
    indices.sort_unstable();
    indices
}
