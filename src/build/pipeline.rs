//! Build pipeline orchestration.
//!
//! The pipeline runs assembled stages strictly in order. The first failure
//! aborts the run; no later stage executes.

use std::fs;
use std::time::Instant;

use crate::build::assemble::assemble;
use crate::build::mode::BuildMode;
use crate::build::progress::{ProgressEvent, ProgressReporter};
use crate::build::result::{RunReport, StageResult, StageStatus};
use crate::build::stage::{StageExecutor, StageSpec};
use crate::build::BuildContext;
use crate::config::StageKind;
use crate::error::{ConfigurationError, PipelineError};

/// Ordered stage list for one build mode.
#[derive(Debug, Clone, PartialEq)]
pub struct Pipeline {
    mode: BuildMode,
    stages: Vec<StageSpec>,
}

impl Pipeline {
    pub(crate) fn new(mode: BuildMode, stages: Vec<StageSpec>) -> Self {
        Self { mode, stages }
    }

    /// Mode the pipeline was assembled for.
    pub fn mode(&self) -> BuildMode {
        self.mode
    }

    /// Stages in execution order.
    pub fn stages(&self) -> &[StageSpec] {
        &self.stages
    }

    /// Number of assembled stages.
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Whether no stage was assembled.
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// The enabled preview server stage, if any.
    pub fn serve_stage(&self) -> Option<&StageSpec> {
        self.enabled_of(StageKind::Serve)
    }

    /// The enabled live-reload stage, if any.
    pub fn live_reload_stage(&self) -> Option<&StageSpec> {
        self.enabled_of(StageKind::LiveReload)
    }

    fn enabled_of(&self, kind: StageKind) -> Option<&StageSpec> {
        self.stages.iter().find(|s| s.kind == kind && s.enabled)
    }

    /// Run every stage in order.
    ///
    /// The output directory is created first. Disabled stages are reported as
    /// skipped. A stage failure is reported and returned immediately.
    pub fn run(
        &self,
        ctx: &BuildContext,
        executor: &dyn StageExecutor,
        reporter: &dyn ProgressReporter,
    ) -> Result<RunReport, PipelineError> {
        let start = Instant::now();
        let mut report = RunReport::new(self.mode);

        reporter.report(ProgressEvent::RunStarted { mode: self.mode, total_stages: self.len() });

        let out_dir = ctx.out_dir();
        if let Err(source) = fs::create_dir_all(&out_dir) {
            let err = PipelineError::OutputDir { path: out_dir, source };
            reporter.report(ProgressEvent::Error { stage: None, message: err.to_string() });
            return Err(err);
        }

        for stage in &self.stages {
            if !stage.enabled {
                tracing::debug!(stage = %stage.name, "stage disabled, skipping");
                reporter.report(ProgressEvent::StageCompleted {
                    stage: stage.name.clone(),
                    status: StageStatus::Skipped,
                    duration_ms: 0,
                });
                report.add_result(StageResult::skipped(stage.name.clone()));
                continue;
            }

            reporter.report(ProgressEvent::StageStarted { stage: stage.name.clone() });
            let stage_start = Instant::now();
            let outcome = executor.execute(stage, ctx);
            let duration = stage_start.elapsed();

            match outcome {
                Ok(()) => {
                    reporter.report(ProgressEvent::StageCompleted {
                        stage: stage.name.clone(),
                        status: StageStatus::Success,
                        duration_ms: duration.as_millis() as u64,
                    });
                    report.add_result(StageResult::success(stage.name.clone(), duration));
                }
                Err(e) => {
                    tracing::debug!(stage = %stage.name, error = %e, "stage failed, aborting run");
                    reporter.report(ProgressEvent::StageCompleted {
                        stage: stage.name.clone(),
                        status: StageStatus::Failed(e.to_string()),
                        duration_ms: duration.as_millis() as u64,
                    });
                    report.add_result(StageResult::failed(stage.name.clone(), e.to_string(), duration));
                    report.total_duration = start.elapsed();
                    reporter.report(completed_event(&report));
                    return Err(e.into());
                }
            }
        }

        report.total_duration = start.elapsed();
        reporter.report(completed_event(&report));
        Ok(report)
    }
}

fn completed_event(report: &RunReport) -> ProgressEvent {
    ProgressEvent::RunCompleted {
        success: report.is_success(),
        duration_ms: report.total_duration.as_millis() as u64,
        succeeded: report.success_count(),
        skipped: report.skipped_count(),
        failed: report.failed_count(),
    }
}

/// A context bound to the pipeline assembled from it.
///
/// Assembly uses the context's mode and stage declarations, so the stage set
/// can never disagree with the mode the stages are invoked with.
#[derive(Debug, Clone)]
pub struct BuildPipeline {
    context: BuildContext,
    pipeline: Pipeline,
}

impl BuildPipeline {
    /// Assemble the pipeline for a context.
    pub fn new(context: BuildContext) -> Result<Self, ConfigurationError> {
        let pipeline = assemble(context.mode(), &context.config().stages)?;
        Ok(Self { context, pipeline })
    }

    /// The build context.
    pub fn context(&self) -> &BuildContext {
        &self.context
    }

    /// The assembled pipeline.
    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Run the pipeline once.
    pub fn run(
        &self,
        executor: &dyn StageExecutor,
        reporter: &dyn ProgressReporter,
    ) -> Result<RunReport, PipelineError> {
        self.pipeline.run(&self.context, executor, reporter)
    }
}
