//! Stagehand - Command-line build orchestrator for bundler-style stage pipelines

use std::process::ExitCode;

use stagehand::cli;

fn main() -> ExitCode {
    cli::run()
}
