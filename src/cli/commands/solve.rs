//! Batch solve command.

use std::io::Read;
use std::path::Path;

use console::style;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use tokio::sync::mpsc;

use tilesolver::config::SolverConfig;
use tilesolver::solver::{SolveEvent, SolveRequest, TileSolver};

fn read_request(path: &Path) -> anyhow::Result<SolveRequest> {
    let raw = if path == Path::new("-") {
        let mut raw = String::new();
        std::io::stdin().read_to_string(&mut raw)?;
        raw
    } else {
        std::fs::read_to_string(path)?
    };
    Ok(serde_json::from_str(&raw)?)
}

pub async fn cmd_solve(
    config: &SolverConfig,
    request_path: &Path,
    enhanced: bool,
    json: bool,
) -> anyhow::Result<()> {
    let mut request = read_request(request_path)?;
    request.enhanced_mode |= enhanced;

    let (event_tx, mut event_rx) = mpsc::channel::<SolveEvent>(100);
    let solver = TileSolver::from_config(config).with_events(event_tx);
    if !solver.pool().has_engines() {
        tracing::warn!("No OCR engine available; results will rely on the heuristic and fallback");
    }

    let bar_style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{bar:30.cyan/blue}] {pos}/{len} {wide_msg}")?
        .progress_chars("█▓░");
    let quiet = json;

    let progress_handle = tokio::spawn(async move {
        let progress = ProgressBar::hidden();
        while let Some(event) = event_rx.recv().await {
            match event {
                SolveEvent::BatchStarted {
                    total_tiles,
                    target,
                } => {
                    if !quiet {
                        progress.set_draw_target(ProgressDrawTarget::stderr());
                    }
                    progress.set_length(total_tiles as u64);
                    progress.set_style(bar_style.clone());
                    progress.set_message(format!("Looking for {}...", target));
                }
                SolveEvent::TileStarted { .. } => {}
                SolveEvent::TileProcessed { index, matched, .. } => {
                    if matched {
                        progress.set_message(format!("tile {} matched", index));
                    }
                    progress.inc(1);
                }
                SolveEvent::TileFailed { index, error } => {
                    progress.set_message(format!("tile {} failed: {}", index, error));
                    progress.inc(1);
                }
                SolveEvent::FallbackUsed { indices } => {
                    progress.set_message(format!("no match, guessing {:?}", indices));
                }
                SolveEvent::BatchComplete { .. } => {
                    progress.finish_and_clear();
                }
            }
        }
    });

    solver.pool().warm_up().await;
    let response = solver.solve(request).await;
    solver.pool().shutdown();
    drop(solver);
    let _ = progress_handle.await;

    if json {
        println!("{}", serde_json::to_string(&response)?);
        return Ok(());
    }

    if response.success {
        let label = if response.used_fallback {
            style("guessed").yellow()
        } else {
            style("matched").green()
        };
        println!(
            "{} {} tiles {:?} for target {} ({}/{} tiles processed)",
            style("✓").green(),
            label,
            response.matching_indices,
            style(&response.target).bold(),
            response.processed_tiles,
            response.total_tiles
        );
    } else {
        println!(
            "{} {}",
            style("✗").red(),
            response.error.as_deref().unwrap_or("solve failed")
        );
    }
    println!("{}", serde_json::to_string_pretty(&response)?);

    if !response.success {
        anyhow::bail!("Solve failed");
    }
    Ok(())
}
