//! Build command implementations (build, stages)

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use super::{EXIT_ERROR, EXIT_INVALID_ARGS, EXIT_SUCCESS};
use crate::build::{
    BuildContext, BuildMode, BuildPipeline, ConsoleProgress, JsonProgress, Pipeline, ProcessExecutor,
    ProgressReporter,
};
use crate::config::loader::{
    absolute_path, default_config, find_config, load_config, merge_cli_overrides, project_root, CliOverrides,
};
use crate::config::StagehandConfig;
use crate::watch::{watch_and_rebuild, WatchSession};

/// Options of the `build` command
#[derive(Debug, Default, Clone)]
pub struct BuildOptions {
    pub watch: bool,
    pub out: Option<PathBuf>,
    pub src: Option<PathBuf>,
    pub config: Option<PathBuf>,
    pub debounce: Option<u32>,
    pub json: bool,
    pub dry_run: bool,
    pub verbose: bool,
}

/// Locate and load the configuration together with the project root.
fn load_project(config: Option<&Path>, verbose: bool) -> Result<(StagehandConfig, PathBuf), ExitCode> {
    let config_path = match config {
        Some(path) if !path.exists() => {
            eprintln!("Error: Config file not found: {}", path.display());
            return Err(ExitCode::from(EXIT_INVALID_ARGS));
        }
        Some(path) => Some(path.to_path_buf()),
        None => find_config(),
    };

    match config_path {
        Some(config_path) => {
            if verbose {
                println!("Using config: {}", config_path.display());
            }
            let cfg = load_config(Some(&config_path)).map_err(|e| {
                eprintln!("Error loading config: {}", e);
                ExitCode::from(EXIT_ERROR)
            })?;
            Ok((cfg, project_root(&config_path)))
        }
        None => {
            if verbose {
                println!("No stagehand.toml found, using defaults");
            }
            Ok((default_config(), absolute_path(Path::new("."))))
        }
    }
}

/// Print the assembled stages of a pipeline.
fn print_stages(pipeline: &Pipeline) {
    println!("{} stages ({}):", pipeline.len(), pipeline.mode());
    for (i, stage) in pipeline.stages().iter().enumerate() {
        let disabled = if stage.enabled { "" } else { " [disabled]" };
        let command = stage.command_line();
        if command.is_empty() {
            println!("  {}. {}{}", i + 1, stage, disabled);
        } else {
            println!("  {}. {}{}: {}", i + 1, stage, disabled, command);
        }
    }
}

fn stages_json(pipeline: &Pipeline) -> serde_json::Value {
    let stages: Vec<serde_json::Value> = pipeline
        .stages()
        .iter()
        .map(|s| {
            serde_json::json!({
                "name": s.name,
                "kind": s.kind,
                "enabled": s.enabled,
                "command": s.command_line(),
            })
        })
        .collect();
    serde_json::json!({ "mode": pipeline.mode().as_str(), "stages": stages })
}

/// Run the build command
pub fn run_build(opts: &BuildOptions) -> ExitCode {
    let (mut config, project_root) = match load_project(opts.config.as_deref(), opts.verbose) {
        Ok(loaded) => loaded,
        Err(code) => return code,
    };

    // Apply CLI overrides to config
    let overrides =
        CliOverrides { out: opts.out.clone(), src: opts.src.clone(), debounce_ms: opts.debounce };
    merge_cli_overrides(&mut config, &overrides);

    let mode = BuildMode::resolve_with(opts.watch);
    tracing::debug!(%mode, root = %project_root.display(), "resolved build mode");

    let context = BuildContext::new(config, project_root, mode).with_verbose(opts.verbose);
    let build = match BuildPipeline::new(context) {
        Ok(build) => build,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(EXIT_ERROR);
        }
    };

    // Dry run mode
    if opts.dry_run {
        if opts.json {
            println!("{}", stages_json(build.pipeline()));
        } else {
            println!("Dry run - would build:");
            println!("  Output: {}", build.context().out_dir().display());
            print_stages(build.pipeline());
        }
        return ExitCode::from(EXIT_SUCCESS);
    }

    if mode.is_development() {
        let mut session = WatchSession::new(build);
        if opts.json {
            session = session.with_reporter(JsonProgress::new());
        }

        println!("Starting watch mode...");
        println!("Press Ctrl+C to stop");
        println!();

        return match watch_and_rebuild(session) {
            Ok(_) => ExitCode::from(EXIT_SUCCESS),
            Err(e) => {
                eprintln!("Watch error: {}", e);
                ExitCode::from(EXIT_ERROR)
            }
        };
    }

    let reporter: Box<dyn ProgressReporter> = if opts.json {
        Box::new(JsonProgress::new())
    } else {
        Box::new(ConsoleProgress::new().with_verbose(opts.verbose))
    };

    // The reporter has already printed the failure.
    match build.run(&ProcessExecutor::new(), reporter.as_ref()) {
        Ok(report) => {
            if opts.verbose && !opts.json {
                println!("{}", report.summary());
            }
            ExitCode::from(EXIT_SUCCESS)
        }
        Err(e) => {
            tracing::debug!(error = %e, "production build failed");
            ExitCode::from(EXIT_ERROR)
        }
    }
}

/// Run the stages command
pub fn run_stages(mode: Option<BuildMode>, config: Option<&Path>, json: bool) -> ExitCode {
    let (config, project_root) = match load_project(config, false) {
        Ok(loaded) => loaded,
        Err(code) => return code,
    };

    let mode = mode.unwrap_or_else(BuildMode::resolve);
    let build = match BuildPipeline::new(BuildContext::new(config, project_root, mode)) {
        Ok(build) => build,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(EXIT_ERROR);
        }
    };

    if json {
        println!("{}", stages_json(build.pipeline()));
    } else {
        print_stages(build.pipeline());
    }
    ExitCode::from(EXIT_SUCCESS)
}
