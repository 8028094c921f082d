//! Build progress reporting.
//!
//! Pipeline runs report through a [`ProgressReporter`]. Console output is
//! human-readable (colored when stderr is a terminal); JSON output emits one
//! object per line for tooling.

use serde_json::json;
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::build::mode::BuildMode;
use crate::build::result::StageStatus;

/// Events that can be reported during a run.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// Pipeline run started
    RunStarted {
        /// Mode of the assembled pipeline
        mode: BuildMode,
        /// Number of assembled stages
        total_stages: usize,
    },
    /// A stage started
    StageStarted {
        /// Stage name
        stage: String,
    },
    /// A stage completed
    StageCompleted {
        /// Stage name
        stage: String,
        /// Stage status
        status: StageStatus,
        /// Duration in milliseconds
        duration_ms: u64,
    },
    /// Pipeline run completed
    RunCompleted {
        /// Whether the run succeeded
        success: bool,
        /// Total duration in milliseconds
        duration_ms: u64,
        /// Number of successful stages
        succeeded: usize,
        /// Number of skipped stages
        skipped: usize,
        /// Number of failed stages
        failed: usize,
    },
    /// A warning was generated
    Warning {
        /// Stage that generated the warning (if applicable)
        stage: Option<String>,
        /// Warning message
        message: String,
    },
    /// An error occurred
    Error {
        /// Stage that generated the error (if applicable)
        stage: Option<String>,
        /// Error message
        message: String,
    },
}

/// Trait for progress reporters.
pub trait ProgressReporter: Send + Sync {
    /// Report a progress event.
    fn report(&self, event: ProgressEvent);

    /// Check if this reporter wants verbose output.
    fn is_verbose(&self) -> bool {
        false
    }
}

/// A progress reporter that discards all events.
#[derive(Debug, Default)]
pub struct NullProgress;

impl NullProgress {
    /// Create a new null progress reporter.
    pub fn new() -> Self {
        Self
    }
}

impl ProgressReporter for NullProgress {
    fn report(&self, _event: ProgressEvent) {}
}

/// Console progress reporter with optional colors.
pub struct ConsoleProgress {
    use_colors: bool,
    verbose: bool,
    current: AtomicUsize,
    total: AtomicUsize,
    output: Mutex<Box<dyn Write + Send>>,
}

impl std::fmt::Debug for ConsoleProgress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsoleProgress")
            .field("use_colors", &self.use_colors)
            .field("verbose", &self.verbose)
            .field("current", &self.current)
            .field("total", &self.total)
            .finish()
    }
}

impl ConsoleProgress {
    /// Create a new console progress reporter writing to stderr.
    pub fn new() -> Self {
        Self {
            use_colors: atty::is(atty::Stream::Stderr),
            verbose: false,
            current: AtomicUsize::new(0),
            total: AtomicUsize::new(0),
            output: Mutex::new(Box::new(std::io::stderr())),
        }
    }

    /// Create a console progress reporter that writes to a custom output.
    pub fn with_output<W: Write + Send + 'static>(output: W) -> Self {
        Self {
            use_colors: false,
            verbose: false,
            current: AtomicUsize::new(0),
            total: AtomicUsize::new(0),
            output: Mutex::new(Box::new(output)),
        }
    }

    /// Set whether to use colors.
    pub fn with_colors(mut self, use_colors: bool) -> Self {
        self.use_colors = use_colors;
        self
    }

    /// Set verbose mode.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    fn color(&self, text: &str, color: &str) -> String {
        if self.use_colors {
            format!("{}{}\x1b[0m", color, text)
        } else {
            text.to_string()
        }
    }

    fn green(&self, text: &str) -> String {
        self.color(text, "\x1b[32m")
    }

    fn yellow(&self, text: &str) -> String {
        self.color(text, "\x1b[33m")
    }

    fn red(&self, text: &str) -> String {
        self.color(text, "\x1b[31m")
    }

    fn cyan(&self, text: &str) -> String {
        self.color(text, "\x1b[36m")
    }

    fn writeln(&self, line: &str) {
        if let Ok(mut output) = self.output.lock() {
            let _ = writeln!(output, "{}", line);
        }
    }
}

impl Default for ConsoleProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressReporter for ConsoleProgress {
    fn report(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::RunStarted { mode, total_stages } => {
                self.total.store(total_stages, Ordering::SeqCst);
                self.current.store(0, Ordering::SeqCst);
                self.writeln(&format!(
                    "{} Running {} stage{} ({})...",
                    self.cyan("[build]"),
                    total_stages,
                    if total_stages == 1 { "" } else { "s" },
                    mode
                ));
            }
            ProgressEvent::StageStarted { stage } => {
                if self.verbose {
                    let current = self.current.load(Ordering::SeqCst) + 1;
                    let total = self.total.load(Ordering::SeqCst);
                    self.writeln(&format!(
                        "{} [{}/{}] Running {}...",
                        self.cyan("[build]"),
                        current,
                        total,
                        stage
                    ));
                }
            }
            ProgressEvent::StageCompleted { stage, status, duration_ms } => {
                let current = self.current.fetch_add(1, Ordering::SeqCst) + 1;
                let total = self.total.load(Ordering::SeqCst);

                let status_str = match &status {
                    StageStatus::Success => self.green("ok"),
                    StageStatus::Skipped => self.yellow("skipped"),
                    StageStatus::Failed(_) => self.red("FAILED"),
                };

                self.writeln(&format!(
                    "{} [{}/{}] {} {} ({})",
                    self.cyan("[build]"),
                    current,
                    total,
                    status_str,
                    stage,
                    format_duration(duration_ms)
                ));

                if let StageStatus::Failed(err) = status {
                    self.writeln(&format!("        {}", self.red(&err)));
                }
            }
            ProgressEvent::RunCompleted { success, duration_ms, succeeded, skipped, failed } => {
                let duration_str = format_duration(duration_ms);
                if success {
                    self.writeln(&format!(
                        "{} {} stage{} ran, {} skipped in {}",
                        self.green("[done]"),
                        succeeded,
                        if succeeded == 1 { "" } else { "s" },
                        skipped,
                        duration_str
                    ));
                } else {
                    self.writeln(&format!(
                        "{} Build failed: {} succeeded, {} skipped, {} {} in {}",
                        self.red("[error]"),
                        succeeded,
                        skipped,
                        failed,
                        if failed == 1 { "failure" } else { "failures" },
                        duration_str
                    ));
                }
            }
            ProgressEvent::Warning { stage, message } => {
                let prefix = stage.map(|s| format!("{}: ", s)).unwrap_or_default();
                self.writeln(&format!("{} {}{}", self.yellow("[warn]"), prefix, message));
            }
            ProgressEvent::Error { stage, message } => {
                let prefix = stage.map(|s| format!("{}: ", s)).unwrap_or_default();
                self.writeln(&format!("{} {}{}", self.red("[error]"), prefix, message));
            }
        }
    }

    fn is_verbose(&self) -> bool {
        self.verbose
    }
}

/// JSON progress reporter for machine-readable output.
pub struct JsonProgress {
    output: Mutex<Box<dyn Write + Send>>,
}

impl std::fmt::Debug for JsonProgress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonProgress").finish()
    }
}

impl JsonProgress {
    /// Create a new JSON progress reporter writing to stderr.
    pub fn new() -> Self {
        Self { output: Mutex::new(Box::new(std::io::stderr())) }
    }

    /// Create a JSON progress reporter that writes to a custom output.
    pub fn with_output<W: Write + Send + 'static>(output: W) -> Self {
        Self { output: Mutex::new(Box::new(output)) }
    }

    fn write_json(&self, value: serde_json::Value) {
        if let Ok(mut output) = self.output.lock() {
            let _ = writeln!(output, "{}", value);
        }
    }
}

impl Default for JsonProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressReporter for JsonProgress {
    fn report(&self, event: ProgressEvent) {
        let value = match event {
            ProgressEvent::RunStarted { mode, total_stages } => json!({
                "event": "run_started",
                "mode": mode,
                "total_stages": total_stages,
            }),
            ProgressEvent::StageStarted { stage } => json!({
                "event": "stage_started",
                "stage": stage,
            }),
            ProgressEvent::StageCompleted { stage, status, duration_ms } => {
                let status_str = match &status {
                    StageStatus::Success => "success",
                    StageStatus::Skipped => "skipped",
                    StageStatus::Failed(_) => "failed",
                };
                let mut value = json!({
                    "event": "stage_completed",
                    "stage": stage,
                    "status": status_str,
                    "duration_ms": duration_ms,
                });
                if let StageStatus::Failed(e) = status {
                    value["error"] = json!(e);
                }
                value
            }
            ProgressEvent::RunCompleted { success, duration_ms, succeeded, skipped, failed } => {
                json!({
                    "event": "run_completed",
                    "success": success,
                    "duration_ms": duration_ms,
                    "succeeded": succeeded,
                    "skipped": skipped,
                    "failed": failed,
                })
            }
            ProgressEvent::Warning { stage, message } => json!({
                "event": "warning",
                "stage": stage,
                "message": message,
            }),
            ProgressEvent::Error { stage, message } => json!({
                "event": "error",
                "stage": stage,
                "message": message,
            }),
        };
        self.write_json(value);
    }
}

/// Format a duration in milliseconds to a human-readable string.
pub(crate) fn format_duration(ms: u64) -> String {
    if ms < 1000 {
        format!("{}ms", ms)
    } else if ms < 60_000 {
        format!("{:.1}s", ms as f64 / 1000.0)
    } else {
        let minutes = ms / 60_000;
        let seconds = (ms % 60_000) / 1000;
        format!("{}m {}s", minutes, seconds)
    }
}
