//! At-most-once side effects.
//!
//! The preview server must start exactly once per watch session even though
//! every successful rebuild asks for it. [`SideEffectGuard`] turns the
//! repeated request into a single launch.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::build::stage::{program_command, StageSpec};
use crate::error::SideEffectLaunchError;

/// An action the guard can fire.
pub trait Launch: Send + Sync {
    /// Perform the action.
    fn launch(&self) -> Result<(), SideEffectLaunchError>;
}

impl<F> Launch for F
where
    F: Fn() -> Result<(), SideEffectLaunchError> + Send + Sync,
{
    fn launch(&self) -> Result<(), SideEffectLaunchError> {
        self()
    }
}

/// Wraps an action so it runs at most once for the guard's lifetime.
///
/// The started flag is set before the action runs and is never cleared: a
/// failed launch is reported once and not retried.
pub struct SideEffectGuard {
    started: AtomicBool,
    action: Box<dyn Launch>,
}

impl std::fmt::Debug for SideEffectGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SideEffectGuard").field("started", &self.has_started()).finish()
    }
}

impl SideEffectGuard {
    /// Guard an action.
    pub fn new(action: impl Launch + 'static) -> Self {
        Self { started: AtomicBool::new(false), action: Box::new(action) }
    }

    /// Fire the action if it has not been fired yet.
    ///
    /// Returns `Ok(true)` when the action ran on this call and `Ok(false)`
    /// when it had already been attempted.
    pub fn attempt(&self) -> Result<bool, SideEffectLaunchError> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Ok(false);
        }
        self.action.launch().map(|()| true)
    }

    /// Whether the action has been attempted.
    pub fn has_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }
}

/// The preview server command of a serve stage.
///
/// Launching spawns the process detached: stdin is closed, stdout and stderr
/// are inherited, and the child is never waited on or supervised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewServer {
    program: String,
    args: Vec<String>,
    cwd: PathBuf,
    env: Vec<(String, String)>,
}

impl PreviewServer {
    /// Create a preview server launcher.
    pub fn new(program: impl Into<String>, args: Vec<String>, cwd: impl Into<PathBuf>) -> Self {
        Self { program: program.into(), args, cwd: cwd.into(), env: Vec::new() }
    }

    /// Build the launcher from an assembled serve stage.
    pub fn from_stage(stage: &StageSpec, project_root: &std::path::Path) -> Option<Self> {
        let program = stage.settings.command.clone()?;
        let cwd = match &stage.settings.dir {
            Some(dir) => crate::config::loader::resolve_path(project_root, dir),
            None => project_root.to_path_buf(),
        };
        let mut env: Vec<(String, String)> =
            stage.settings.env.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        env.extend(stage.option_env());
        Some(Self { program, args: stage.settings.args.clone(), cwd, env })
    }

    /// The command line as a single display string.
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl Launch for PreviewServer {
    fn launch(&self) -> Result<(), SideEffectLaunchError> {
        tracing::info!(command = %self.command_line(), "starting preview server");
        program_command(&self.program)
            .args(&self.args)
            .current_dir(&self.cwd)
            .envs(self.env.iter().map(|(k, v)| (k, v)))
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()
            .map(drop)
            .map_err(|source| SideEffectLaunchError::Spawn { command: self.command_line(), source })
    }
}
