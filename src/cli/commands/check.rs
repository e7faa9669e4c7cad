//! Recognizer availability check.

use console::style;

use tilesolver::config::SolverConfig;
use tilesolver::ocr::{RecognizerPool, RecognizerType};

const ALL_TYPES: [RecognizerType; 4] = [
    RecognizerType::Tesseract,
    RecognizerType::PaddleOcr,
    RecognizerType::Ocrs,
    RecognizerType::Heuristic,
];

/// Print which recognizers can run on this machine.
pub fn cmd_check(config: &SolverConfig) -> anyhow::Result<()> {
    println!("\n{}", style("Recognizer Status").bold());
    println!("{}", "-".repeat(50));

    let mut engines = 0;
    for kind in ALL_TYPES {
        let name = kind.as_str();
        match RecognizerPool::create_recognizer(name, config) {
            Some(recognizer) => {
                let available = recognizer.is_available();
                let status = if available {
                    style("✓ available").green()
                } else {
                    style("✗ not available").red()
                };
                println!("  {:<15} {}", name, status);
                println!("                  {}", style(recognizer.availability_hint()).dim());
                if available && kind != RecognizerType::Heuristic {
                    engines += 1;
                }
            }
            None => {
                println!(
                    "  {:<15} {}",
                    name,
                    style(format!("not compiled (enable ocr-{} feature)", feature_name(kind)))
                        .dim()
                );
            }
        }
    }

    println!("\n{}", style("Configured order:").cyan());
    println!("  {}", config.recognizers.join(" → "));
    println!(
        "  heuristic: {}",
        if config.heuristic { "enabled" } else { "disabled" }
    );

    println!("\n{}", style("Thresholds:").cyan());
    println!("  {:<15} {}", "confidence", config.confidence_threshold);
    println!("  {:<15} {}", "similarity", config.similarity_threshold);
    println!("  {:<15} {} (max {})", "fallback", config.fallback.policy, config.fallback.max_picks);

    if let Some(warning) = engine_warning(engines) {
        println!("\n{} {}", style("!").yellow(), warning);
    }

    Ok(())
}

/// Warning for a machine with fewer than two usable engines.
fn engine_warning(engines: usize) -> Option<&'static str> {
    match engines {
        0 => Some("No OCR engine available. Install tesseract-ocr or build with --features ocr-all."),
        1 => Some(
            "Only one OCR engine available. Build with --features ocr-paddle for a second engine.",
        ),
        _ => None,
    }
}

fn feature_name(kind: RecognizerType) -> &'static str {
    match kind {
        RecognizerType::PaddleOcr => "paddle",
        RecognizerType::Ocrs => "ocrs",
        _ => "all",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_warning_points_at_paddle_feature() {
        assert!(engine_warning(0).unwrap().contains("ocr-all"));
        assert!(engine_warning(1).unwrap().contains("--features ocr-paddle"));
        assert_eq!(engine_warning(2), None);
    }
}
