//! Live-reload notification.
//!
//! After each successful rebuild the watch dispatcher signals a
//! [`ReloadChannel`]. Delivery is fire and forget: nothing is awaited and a
//! failed signal is logged, not retried.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::build::stage::StageSpec;

/// Name of the trigger file written into the served directory.
pub const TRIGGER_FILE: &str = ".livereload";

/// A sink for reload signals.
pub trait ReloadChannel: Send {
    /// Signal that the bundle in `out_dir` was rewritten.
    fn notify(&self, out_dir: &Path);

    /// Whether signals reach a browser at all.
    fn is_active(&self) -> bool {
        true
    }
}

/// Discards every signal.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullReload;

impl ReloadChannel for NullReload {
    fn notify(&self, _out_dir: &Path) {}

    fn is_active(&self) -> bool {
        false
    }
}

/// Touches a trigger file in the served directory.
///
/// Any preview server that reloads on file changes in that directory picks
/// the signal up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TouchReload {
    trigger: PathBuf,
}

impl TouchReload {
    /// Signal through `<served_dir>/.livereload`.
    pub fn new(served_dir: impl AsRef<Path>) -> Self {
        Self { trigger: served_dir.as_ref().join(TRIGGER_FILE) }
    }

    /// Build the channel from an assembled live-reload stage.
    pub fn from_stage(stage: &StageSpec, project_root: &Path) -> Option<Self> {
        let watch = stage.settings.watch.as_ref()?;
        Some(Self::new(crate::config::loader::resolve_path(project_root, watch)))
    }

    /// Path of the trigger file.
    pub fn trigger(&self) -> &Path {
        &self.trigger
    }
}

impl ReloadChannel for TouchReload {
    fn notify(&self, out_dir: &Path) {
        let stamp = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis();
        match std::fs::write(&self.trigger, format!("{}\n", stamp)) {
            Ok(()) => {
                tracing::debug!(trigger = %self.trigger.display(), out = %out_dir.display(), "reload signalled")
            }
            Err(e) => tracing::warn!(trigger = %self.trigger.display(), error = %e, "live reload signal failed"),
        }
    }
}
