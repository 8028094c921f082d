//! Build context containing configuration and state for a build.

use crate::build::mode::BuildMode;
use crate::config::StagehandConfig;
use std::path::{Path, PathBuf};

/// Build context containing configuration and paths for a build operation.
///
/// The context provides access to all information needed to execute a
/// pipeline, including the configuration, project root, output directory and
/// the build mode resolved at startup.
#[derive(Debug, Clone)]
pub struct BuildContext {
    /// The loaded configuration
    config: StagehandConfig,
    /// Project root directory (where stagehand.toml is located)
    project_root: PathBuf,
    /// Build mode, fixed for the process lifetime
    mode: BuildMode,
    /// Whether to run in verbose mode
    verbose: bool,
}

impl BuildContext {
    /// Create a new build context.
    pub fn new(config: StagehandConfig, project_root: PathBuf, mode: BuildMode) -> Self {
        Self { config, project_root, mode, verbose: false }
    }

    /// Get the configuration.
    pub fn config(&self) -> &StagehandConfig {
        &self.config
    }

    /// Get the project root directory.
    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// Build mode for this process.
    pub fn mode(&self) -> BuildMode {
        self.mode
    }

    /// Get the source directory (resolved to absolute path).
    pub fn src_dir(&self) -> PathBuf {
        self.resolve_path(&self.config.project.src)
    }

    /// Get the output directory (resolved to absolute path).
    pub fn out_dir(&self) -> PathBuf {
        self.resolve_path(&self.config.project.out)
    }

    /// Watched paths (resolved to absolute paths).
    ///
    /// Without explicit `[watch] paths` the source directory is watched.
    pub fn watch_paths(&self) -> Vec<PathBuf> {
        if self.config.watch.paths.is_empty() {
            return vec![self.src_dir()];
        }
        self.config.watch.paths.iter().map(|p| self.resolve_path(p)).collect()
    }

    /// Whether verbose mode is enabled.
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    /// Set verbose mode.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Resolve a path relative to the project root.
    ///
    /// If the path is absolute, returns it unchanged.
    /// If relative, joins it with the project root.
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        crate::config::loader::resolve_path(&self.project_root, path)
    }
}
