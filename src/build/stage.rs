//! Stage definitions and the stage invocation contract.
//!
//! A stage is an opaque transform step. The pipeline hands each stage its
//! static settings and the build context; what the stage does with them is
//! up to the [`StageExecutor`].

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use crate::build::BuildContext;
use crate::config::{Inclusion, StageDecl, StageKind};
use crate::error::StageExecutionError;

/// Static settings of an assembled stage.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StageSettings {
    /// Program to run
    pub command: Option<String>,
    /// Program arguments
    pub args: Vec<String>,
    /// Extra environment
    pub env: BTreeMap<String, String>,
    /// Working directory (relative to the project root)
    pub dir: Option<PathBuf>,
    /// Served directory for live reload
    pub watch: Option<PathBuf>,
}

/// A stage as it appears in an assembled pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct StageSpec {
    /// Stage name
    pub name: String,
    /// Stage kind
    pub kind: StageKind,
    /// Inclusion predicate the stage was assembled under
    pub when: Inclusion,
    /// Disabled stages are skipped at execution time
    pub enabled: bool,
    /// Static settings
    pub settings: StageSettings,
    /// Opaque option record, unchanged from the declaration
    pub options: BTreeMap<String, toml::Value>,
}

impl StageSpec {
    /// Build the assembled form of a declaration, carrying configuration unchanged.
    pub fn from_decl(decl: &StageDecl) -> Self {
        Self {
            name: decl.name.clone(),
            kind: decl.kind,
            when: decl.when,
            enabled: decl.enabled,
            settings: StageSettings {
                command: decl.command.clone(),
                args: decl.args.clone(),
                env: decl.env.clone(),
                dir: decl.dir.clone(),
                watch: decl.watch.clone(),
            },
            options: decl.options.clone(),
        }
    }

    /// The command line as a single display string.
    pub fn command_line(&self) -> String {
        let mut parts: Vec<&str> = Vec::with_capacity(self.settings.args.len() + 1);
        if let Some(cmd) = &self.settings.command {
            parts.push(cmd);
        }
        parts.extend(self.settings.args.iter().map(String::as_str));
        parts.join(" ")
    }

    /// Environment variables describing the options record.
    ///
    /// Keys become `STAGEHAND_OPT_<UPPER_KEY>`; strings are passed verbatim,
    /// everything else as JSON.
    pub fn option_env(&self) -> Vec<(String, String)> {
        self.options
            .iter()
            .map(|(key, value)| {
                let key: String = key
                    .chars()
                    .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
                    .collect();
                let value = match value {
                    toml::Value::String(s) => s.clone(),
                    other => serde_json::to_string(other).unwrap_or_else(|_| other.to_string()),
                };
                (format!("STAGEHAND_OPT_{}", key), value)
            })
            .collect()
    }
}

impl std::fmt::Display for StageSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name, self.kind)
    }
}

/// Runs a single stage.
///
/// Implementations receive the stage's static settings and the build
/// context (which carries the build mode) and report success or a
/// structured failure.
pub trait StageExecutor {
    /// Execute one stage to completion.
    fn execute(&self, stage: &StageSpec, ctx: &BuildContext) -> Result<(), StageExecutionError>;
}

impl<F> StageExecutor for F
where
    F: Fn(&StageSpec, &BuildContext) -> Result<(), StageExecutionError>,
{
    fn execute(&self, stage: &StageSpec, ctx: &BuildContext) -> Result<(), StageExecutionError> {
        self(stage, ctx)
    }
}

/// Create the [`Command`] that starts `program`.
///
/// On Windows, tools such as `npm` are installed as `.cmd` shims that cannot
/// be spawned directly, so the program is started through `cmd /C`.
pub fn program_command(program: &str) -> Command {
    #[cfg(windows)]
    {
        let mut command = Command::new("cmd");
        command.arg("/C").arg(program);
        command
    }
    #[cfg(not(windows))]
    {
        Command::new(program)
    }
}

/// Executes stages as external processes.
///
/// Command stages run with inherited standard streams and block until the
/// process exits. Serve stages do nothing here; their effect is the guarded
/// launch after a successful rebuild. Live-reload stages make sure the
/// served directory exists.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessExecutor;

impl ProcessExecutor {
    /// Create a new process executor.
    pub fn new() -> Self {
        Self
    }

    fn run_command(&self, stage: &StageSpec, ctx: &BuildContext) -> Result<(), StageExecutionError> {
        let program = stage.settings.command.as_deref().ok_or_else(|| {
            StageExecutionError::failed(&stage.name, "no command configured")
        })?;
        let cwd = match &stage.settings.dir {
            Some(dir) => ctx.resolve_path(dir),
            None => ctx.project_root().to_path_buf(),
        };

        tracing::debug!(stage = %stage.name, command = %stage.command_line(), cwd = %cwd.display(), "running stage");

        let status = program_command(program)
            .args(&stage.settings.args)
            .current_dir(&cwd)
            .envs(&stage.settings.env)
            .envs(stage.option_env())
            .env("STAGEHAND_MODE", ctx.mode().as_str())
            .env("STAGEHAND_DEV", if ctx.mode().is_development() { "true" } else { "false" })
            .env("STAGEHAND_OUT_DIR", ctx.out_dir())
            .env("STAGEHAND_STAGE", &stage.name)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .map_err(|source| StageExecutionError::Spawn {
                stage: stage.name.clone(),
                command: stage.command_line(),
                source,
            })?;

        if status.success() {
            Ok(())
        } else {
            Err(StageExecutionError::ExitStatus {
                stage: stage.name.clone(),
                command: stage.command_line(),
                status,
            })
        }
    }
}

impl StageExecutor for ProcessExecutor {
    fn execute(&self, stage: &StageSpec, ctx: &BuildContext) -> Result<(), StageExecutionError> {
        match stage.kind {
            StageKind::Command => self.run_command(stage, ctx),
            StageKind::Serve => Ok(()),
            StageKind::LiveReload => {
                let Some(watch) = &stage.settings.watch else {
                    return Ok(());
                };
                let path = ctx.resolve_path(watch);
                std::fs::create_dir_all(&path).map_err(|source| StageExecutionError::Prepare {
                    stage: stage.name.clone(),
                    path,
                    source,
                })
            }
        }
    }
}
