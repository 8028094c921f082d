//! Run result types.
//!
//! Contains types for representing the outcome of a pipeline run.

use std::time::Duration;

use crate::build::mode::BuildMode;

/// Status of a single stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageStatus {
    /// Stage succeeded
    Success,
    /// Stage skipped (statically disabled)
    Skipped,
    /// Stage failed with error
    Failed(String),
}

impl StageStatus {
    /// Check if the status indicates success.
    pub fn is_success(&self) -> bool {
        matches!(self, StageStatus::Success | StageStatus::Skipped)
    }

    /// Check if the status indicates failure.
    pub fn is_failure(&self) -> bool {
        matches!(self, StageStatus::Failed(_))
    }
}

impl std::fmt::Display for StageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StageStatus::Success => write!(f, "success"),
            StageStatus::Skipped => write!(f, "skipped"),
            StageStatus::Failed(err) => write!(f, "failed: {}", err),
        }
    }
}

/// Result of running a single stage.
#[derive(Debug, Clone)]
pub struct StageResult {
    /// Stage that ran
    pub stage: String,
    /// Stage status
    pub status: StageStatus,
    /// Stage duration
    pub duration: Duration,
}

impl StageResult {
    /// Create a successful result.
    pub fn success(stage: String, duration: Duration) -> Self {
        Self { stage, status: StageStatus::Success, duration }
    }

    /// Create a skipped result.
    pub fn skipped(stage: String) -> Self {
        Self { stage, status: StageStatus::Skipped, duration: Duration::ZERO }
    }

    /// Create a failed result.
    pub fn failed(stage: String, error: String, duration: Duration) -> Self {
        Self { stage, status: StageStatus::Failed(error), duration }
    }
}

/// Result of a complete pipeline run.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Mode the run was assembled for
    pub mode: BuildMode,
    /// Results for each stage that was reached
    pub stages: Vec<StageResult>,
    /// Total run duration
    pub total_duration: Duration,
}

impl RunReport {
    /// Create a new empty report.
    pub fn new(mode: BuildMode) -> Self {
        Self { mode, stages: Vec::new(), total_duration: Duration::ZERO }
    }

    /// Add a stage result.
    pub fn add_result(&mut self, result: StageResult) {
        self.stages.push(result);
    }

    /// Get the number of successful stages.
    pub fn success_count(&self) -> usize {
        self.stages.iter().filter(|r| matches!(r.status, StageStatus::Success)).count()
    }

    /// Get the number of skipped stages.
    pub fn skipped_count(&self) -> usize {
        self.stages.iter().filter(|r| matches!(r.status, StageStatus::Skipped)).count()
    }

    /// Get the number of failed stages.
    pub fn failed_count(&self) -> usize {
        self.stages.iter().filter(|r| r.status.is_failure()).count()
    }

    /// Check if the run succeeded (no failures).
    pub fn is_success(&self) -> bool {
        self.stages.iter().all(|r| r.status.is_success())
    }

    /// Format a summary of the run.
    pub fn summary(&self) -> String {
        let success = self.success_count();
        let skipped = self.skipped_count();
        let failed = self.failed_count();

        if failed > 0 {
            let mut lines = vec![format!(
                "Build failed ({}): {} succeeded, {} skipped, {} failed",
                self.mode, success, skipped, failed
            )];
            for stage in self.stages.iter().filter(|r| r.status.is_failure()) {
                lines.push(format!("  - {}: {}", stage.stage, stage.status));
            }
            lines.join("\n")
        } else {
            format!(
                "Build succeeded ({}): {} stages ran, {} skipped in {:?}",
                self.mode, success, skipped, self.total_duration
            )
        }
    }
}
