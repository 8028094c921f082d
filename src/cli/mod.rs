//! Command-line interface implementation
//!
//! This module provides the CLI entry point and dispatches to submodules
//! for specific command implementations.

mod build;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

use tracing_subscriber::EnvFilter;

use crate::build::BuildMode;

pub use build::BuildOptions;

/// Exit codes
pub(crate) const EXIT_SUCCESS: u8 = 0;
pub(crate) const EXIT_ERROR: u8 = 1;
pub(crate) const EXIT_INVALID_ARGS: u8 = 2;

/// Environment variable holding the tracing filter directive.
pub const LOG_ENV: &str = "STAGEHAND_LOG";

/// Stagehand - Run a mode-aware build pipeline
#[derive(Parser)]
#[command(name = "stagehand")]
#[command(about = "Stagehand - Run bundler stage pipelines in production or watch mode")]
#[command(version)]
pub struct Cli {
    /// Show debug diagnostics
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the pipeline once, or keep rebuilding in development mode
    Build {
        /// Development mode: rebuild on change, start the preview server
        /// (also selected by the STAGEHAND_WATCH environment variable)
        #[arg(short, long)]
        watch: bool,

        /// Override output directory
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Override source directory
        #[arg(short, long)]
        src: Option<PathBuf>,

        /// Config file (default: nearest stagehand.toml)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Override the watch debounce in milliseconds
        #[arg(long)]
        debounce: Option<u32>,

        /// Emit progress as JSON lines
        #[arg(long)]
        json: bool,

        /// Show the assembled stages without running them
        #[arg(long)]
        dry_run: bool,
    },

    /// List the stages assembled for a build mode
    Stages {
        /// Build mode (default: resolved from STAGEHAND_WATCH)
        #[arg(short, long)]
        mode: Option<BuildMode>,

        /// Config file (default: nearest stagehand.toml)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Install the diagnostics subscriber.
///
/// `STAGEHAND_LOG` takes a tracing filter directive; without it only warnings
/// are shown, or debug output with `-v`.
fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("stagehand=debug")
    } else {
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .try_init();
}

/// Parse arguments and run the selected command.
pub fn run() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Build { watch, out, src, config, debounce, json, dry_run } => {
            build::run_build(&BuildOptions {
                watch,
                out,
                src,
                config,
                debounce,
                json,
                dry_run,
                verbose: cli.verbose,
            })
        }
        Commands::Stages { mode, config, json } => {
            build::run_stages(mode, config.as_deref(), json)
        }
    }
}
