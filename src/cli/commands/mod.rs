//! CLI commands implementation.
//!
//! This module contains the CLI parser and dispatches to command-specific modules.

mod check;
mod ocr;
mod solve;
mod target;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use tilesolver::config::SolverConfig;

#[derive(Parser)]
#[command(name = "tilesolver")]
#[command(about = "Find the tiles of a digit CAPTCHA that show a target number")]
#[command(version)]
pub struct Cli {
    /// Config file path (overrides auto-discovery)
    #[arg(short, long, global = true, env = "TILESOLVER_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Solve a batch request (JSON) and print the response
    Solve {
        /// Request file, or "-" for stdin
        #[arg(short, long, default_value = "-")]
        request: PathBuf,
        /// Run the extra recognizer configurations
        #[arg(short, long)]
        enhanced: bool,
        /// Print only the response JSON
        #[arg(long)]
        json: bool,
    },

    /// Run the pipeline on one image and report what each stage found
    Ocr {
        /// Image file
        image: PathBuf,
        /// Digits to look for
        #[arg(short, long)]
        target: String,
        /// Run the extra recognizer configurations
        #[arg(short, long)]
        enhanced: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show which recognizers are available
    Check,

    /// Extract the target number from challenge instruction text
    Target {
        /// Instruction text, e.g. "Please select all boxes with number 472"
        text: String,
    },
}

/// Run the CLI.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Commands::Target { text } = &cli.command {
        return target::cmd_target(text);
    }
    let config = SolverConfig::load(cli.config.as_deref()).await?;

    match cli.command {
        Commands::Solve {
            request,
            enhanced,
            json,
        } => solve::cmd_solve(&config, &request, enhanced, json).await,
        Commands::Ocr {
            image,
            target,
            enhanced,
            json,
        } => ocr::cmd_ocr(&config, &image, &target, enhanced, json).await,
        Commands::Check => check::cmd_check(&config),
        Commands::Target { .. } => Ok(()),
    }
}
