//! Error taxonomy for pipeline assembly, stage execution and the guarded
//! preview server launch.

use std::path::PathBuf;
use std::process::ExitStatus;
use thiserror::Error;

/// A stage declaration is structurally invalid.
///
/// Raised by the assembler before any stage runs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    /// A declared stage has no name
    #[error("stage #{index} has an empty name")]
    EmptyName {
        /// Position of the declaration (0-indexed)
        index: usize,
    },
    /// Two declarations share a name
    #[error("stage '{0}' is declared more than once")]
    DuplicateStage(String),
    /// A required setting is missing or blank
    #[error("stage '{stage}': '{field}' must be set")]
    MissingSetting {
        /// Stage name
        stage: String,
        /// Missing field
        field: &'static str,
    },
    /// The stage kind cannot take part in the given mode
    #[error("stage '{stage}': {kind} stages only run in watch mode and must be declared with when = \"development\"")]
    WatchOnlyStage {
        /// Stage name
        stage: String,
        /// Stage kind
        kind: String,
    },
    /// Only a single stage of this kind is allowed
    #[error("only one {kind} stage may be declared (found '{first}' and '{second}')")]
    MultipleStages {
        /// Stage kind
        kind: String,
        /// First declaration
        first: String,
        /// Offending declaration
        second: String,
    },
}

/// A stage failed while the pipeline was running.
#[derive(Debug, Error)]
pub enum StageExecutionError {
    /// The stage's command could not be started
    #[error("stage '{stage}': failed to run '{command}': {source}")]
    Spawn {
        /// Stage name
        stage: String,
        /// Command that was attempted
        command: String,
        /// Underlying OS error
        #[source]
        source: std::io::Error,
    },
    /// The stage's command exited unsuccessfully
    #[error("stage '{stage}': '{command}' exited with {status}")]
    ExitStatus {
        /// Stage name
        stage: String,
        /// Command that ran
        command: String,
        /// Exit status reported by the OS
        status: ExitStatus,
    },
    /// Filesystem preparation for the stage failed
    #[error("stage '{stage}': cannot prepare {}: {source}", .path.display())]
    Prepare {
        /// Stage name
        stage: String,
        /// Path that could not be prepared
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },
    /// Any other failure reported by a stage
    #[error("stage '{stage}': {message}")]
    Failed {
        /// Stage name
        stage: String,
        /// Failure description
        message: String,
    },
}

impl StageExecutionError {
    /// Create a generic failure for a stage.
    pub fn failed(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Failed { stage: stage.into(), message: message.into() }
    }

    /// Name of the stage that failed.
    pub fn stage(&self) -> &str {
        match self {
            Self::Spawn { stage, .. }
            | Self::ExitStatus { stage, .. }
            | Self::Prepare { stage, .. }
            | Self::Failed { stage, .. } => stage,
        }
    }
}

/// The guarded auxiliary process failed to start.
#[derive(Debug, Error)]
pub enum SideEffectLaunchError {
    /// The process could not be spawned
    #[error("failed to launch '{command}': {source}")]
    Spawn {
        /// Command line that was attempted
        command: String,
        /// Underlying OS error
        #[source]
        source: std::io::Error,
    },
    /// Any other launch failure
    #[error("launch failed: {0}")]
    Other(String),
}

/// Anything that aborts a single pipeline run.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Invalid stage configuration
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigurationError),
    /// A stage failed
    #[error("{0}")]
    Stage(#[from] StageExecutionError),
    /// The output directory could not be created
    #[error("cannot create output directory {}: {source}", .path.display())]
    OutputDir {
        /// Output directory
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_error_display() {
        let err = ConfigurationError::MissingSetting { stage: "native".to_string(), field: "command" };
        assert_eq!(err.to_string(), "stage 'native': 'command' must be set");

        let err = ConfigurationError::DuplicateStage("bundle".to_string());
        assert!(err.to_string().contains("'bundle'"));
    }

    #[test]
    fn test_stage_execution_error_stage_name() {
        let err = StageExecutionError::failed("minify", "syntax error");
        assert_eq!(err.stage(), "minify");
        assert_eq!(err.to_string(), "stage 'minify': syntax error");
    }

    #[test]
    fn test_pipeline_error_from_stage() {
        let err: PipelineError = StageExecutionError::failed("bundle", "boom").into();
        assert!(matches!(err, PipelineError::Stage(_)));
        assert_eq!(err.to_string(), "stage 'bundle': boom");
    }

    #[test]
    fn test_launch_error_display() {
        let err = SideEffectLaunchError::Spawn {
            command: "npm run start".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
        };
        assert!(err.to_string().contains("npm run start"));
    }
}
