//! Single-image OCR report.

use std::path::Path;

use console::style;

use tilesolver::config::SolverConfig;
use tilesolver::ocr::RecognizeMode;
use tilesolver::solver::{TilePayload, TileSolver};
use tilesolver::target::Target;

pub async fn cmd_ocr(
    config: &SolverConfig,
    image: &Path,
    target: &str,
    enhanced: bool,
    json: bool,
) -> anyhow::Result<()> {
    let target: Target = target.parse()?;
    let bytes = std::fs::read(image)?;

    let solver = TileSolver::from_config(config);
    solver.pool().warm_up().await;
    let report = solver
        .analyze_image(
            TilePayload::Bytes(bytes),
            &target,
            RecognizeMode::from_enhanced(enhanced),
        )
        .await;
    solver.pool().shutdown();
    let report = report?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("\n{}", style(format!("OCR report: {}", image.display())).bold());
    println!("{}", "-".repeat(50));
    println!("  {:<18} {}", "Target", target);
    println!("  {:<18} {}", "Variants", report.variants);
    println!("  {:<18} {}", "Detections", report.total_detections);

    println!("\n{}", style("Per recognizer:").cyan());
    if report.per_recognizer.is_empty() {
        println!("  {}", style("no recognizer produced output").dim());
    }
    for (name, count) in &report.per_recognizer {
        println!("  {:<18} {}", name, count);
    }

    println!("\n{}", style("Top texts:").cyan());
    for ranked in report.ranked.iter().take(10) {
        println!(
            "  {:<18} {:.2} (x{})",
            ranked.text, ranked.confidence, ranked.occurrences
        );
    }

    println!();
    if report.is_match() {
        println!(
            "{} matches {}: {:?}",
            style("✓").green(),
            target,
            report.matches
        );
    } else {
        println!("{} no match for {}", style("✗").red(), target);
    }

    Ok(())
}
