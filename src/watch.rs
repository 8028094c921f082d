//! Watch mode for automatic rebuilds on file changes
//!
//! The dispatcher is a single-threaded loop with two states, Idle and
//! Building. Change events that arrive while Building stay queued in the
//! channel; once the build finishes every queued event is drained and merged
//! into one follow-up rebuild, so no change is lost and at most one build is
//! ever in flight.

use notify::{RecursiveMode, Watcher};
use notify_debouncer_mini::{new_debouncer, DebounceEventResult, DebouncedEventKind};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver};
use std::sync::Arc;
use std::time::Duration;

use crate::build::guard::{PreviewServer, SideEffectGuard};
use crate::build::progress::{ConsoleProgress, ProgressEvent, ProgressReporter};
use crate::build::stage::{ProcessExecutor, StageExecutor};
use crate::build::{BuildContext, BuildPipeline};
use crate::config::loader::absolute_path;
use crate::reload::{NullReload, ReloadChannel, TouchReload};

/// Error during watch mode
#[derive(Debug)]
pub enum WatchError {
    /// Failed to initialize file watcher
    WatcherInit(notify::Error),
    /// Failed to add watch path
    WatchPath(notify::Error),
    /// Watched directory not found
    SourceNotFound(PathBuf),
}

impl std::fmt::Display for WatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WatchError::WatcherInit(e) => write!(f, "Failed to initialize file watcher: {}", e),
            WatchError::WatchPath(e) => write!(f, "Failed to watch path: {}", e),
            WatchError::SourceNotFound(path) => {
                write!(f, "Watched directory not found: {}", path.display())
            }
        }
    }
}

impl std::error::Error for WatchError {}

/// Input to the dispatcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    /// Files changed
    Changed(Vec<PathBuf>),
    /// The watch backend reported an error (non-fatal)
    Error(String),
}

impl From<DebounceEventResult> for WatchEvent {
    fn from(result: DebounceEventResult) -> Self {
        match result {
            Ok(events) => WatchEvent::Changed(
                events
                    .into_iter()
                    .filter(|e| matches!(e.kind, DebouncedEventKind::Any))
                    .map(|e| e.path)
                    .collect(),
            ),
            Err(error) => WatchEvent::Error(format!("{:?}", error)),
        }
    }
}

/// Dispatcher state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    /// Waiting for a change
    Idle,
    /// Pipeline running
    Building,
}

/// Counters for a watch session
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SessionStats {
    /// Pipeline runs started
    pub builds: usize,
    /// Runs that completed successfully
    pub succeeded: usize,
    /// Runs that failed
    pub failed: usize,
    /// Reload signals sent
    pub reloads: usize,
    /// Errors reported by the watch backend
    pub watch_errors: usize,
}

/// Decides which changed paths trigger a rebuild.
#[derive(Debug, Clone)]
pub struct ChangeFilter {
    root: PathBuf,
    out_dir: PathBuf,
    extensions: Vec<String>,
    ignore: Vec<glob::Pattern>,
}

impl ChangeFilter {
    /// Filter derived from the `[watch]` section of a context.
    ///
    /// The output directory is always ignored so bundle writes never
    /// retrigger a build. Invalid ignore patterns are skipped (they are
    /// rejected earlier by config validation).
    pub fn from_context(ctx: &BuildContext) -> Self {
        let watch = &ctx.config().watch;
        Self {
            root: absolute_path(ctx.project_root()),
            out_dir: absolute_path(&ctx.out_dir()),
            extensions: watch.extensions.iter().map(|e| e.trim_start_matches('.').to_lowercase()).collect(),
            ignore: watch.ignore.iter().filter_map(|p| glob::Pattern::new(p).ok()).collect(),
        }
    }

    /// Check if a file is relevant for rebuilding
    pub fn is_relevant(&self, path: &Path) -> bool {
        if path.starts_with(&self.out_dir) {
            return false;
        }

        let relative = path.strip_prefix(&self.root).unwrap_or(path);
        if self.ignore.iter().any(|p| p.matches_path(path) || p.matches_path(relative)) {
            return false;
        }

        match path.extension() {
            Some(ext) => {
                let ext = ext.to_string_lossy().to_lowercase();
                self.extensions.iter().any(|e| *e == ext)
            }
            None => false,
        }
    }
}

/// The development-mode rebuild loop.
///
/// Owns the assembled pipeline together with everything that reacts to a
/// successful rebuild: the live-reload channel and the guarded preview
/// server launch.
pub struct WatchSession {
    build: BuildPipeline,
    executor: Box<dyn StageExecutor>,
    reporter: Box<dyn ProgressReporter>,
    reload: Box<dyn ReloadChannel>,
    guard: Option<Arc<SideEffectGuard>>,
    filter: ChangeFilter,
    state: DispatchState,
    stats: SessionStats,
}

impl WatchSession {
    /// Create a session for an assembled pipeline.
    ///
    /// Stages run as processes, progress goes to the console, the reload
    /// channel comes from the live-reload stage and the guarded launch from
    /// the serve stage (when those stages are assembled).
    pub fn new(build: BuildPipeline) -> Self {
        let root = build.context().project_root().to_path_buf();
        let pipeline = build.pipeline();

        let reload: Box<dyn ReloadChannel> =
            match pipeline.live_reload_stage().and_then(|s| TouchReload::from_stage(s, &root)) {
                Some(channel) => Box::new(channel),
                None => Box::new(NullReload),
            };
        let guard = pipeline
            .serve_stage()
            .and_then(|s| PreviewServer::from_stage(s, &root))
            .map(|server| Arc::new(SideEffectGuard::new(server)));
        let filter = ChangeFilter::from_context(build.context());
        let verbose = build.context().is_verbose();

        Self {
            build,
            executor: Box::new(ProcessExecutor::new()),
            reporter: Box::new(ConsoleProgress::new().with_verbose(verbose)),
            reload,
            guard,
            filter,
            state: DispatchState::Idle,
            stats: SessionStats::default(),
        }
    }

    /// Use a different stage executor.
    pub fn with_executor(mut self, executor: impl StageExecutor + 'static) -> Self {
        self.executor = Box::new(executor);
        self
    }

    /// Use a different progress reporter.
    pub fn with_reporter(mut self, reporter: impl ProgressReporter + 'static) -> Self {
        self.reporter = Box::new(reporter);
        self
    }

    /// Use a different live-reload channel.
    pub fn with_reload(mut self, reload: impl ReloadChannel + 'static) -> Self {
        self.reload = Box::new(reload);
        self
    }

    /// Use a different guarded launch.
    pub fn with_guard(mut self, guard: Arc<SideEffectGuard>) -> Self {
        self.guard = Some(guard);
        self
    }

    /// Current dispatcher state.
    pub fn state(&self) -> DispatchState {
        self.state
    }

    /// Session counters so far.
    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    /// The guarded launch, if the pipeline has one.
    pub fn guard(&self) -> Option<&Arc<SideEffectGuard>> {
        self.guard.as_ref()
    }

    /// Run one Building phase.
    ///
    /// On success the reload channel is signalled and, in development mode,
    /// the guarded launch is attempted. A failure is reported and touches
    /// neither. Returns whether the run succeeded.
    pub fn rebuild(&mut self, changed: &[PathBuf]) -> bool {
        self.state = DispatchState::Building;
        self.stats.builds += 1;

        let watch = &self.build.context().config().watch;
        if watch.clear_screen {
            clear_screen();
        }
        for path in changed {
            if let Some(name) = path.file_name() {
                println!("[{}] Changed: {}", timestamp(), name.to_string_lossy());
            }
        }

        let result = self.build.run(self.executor.as_ref(), self.reporter.as_ref());
        let success = match result {
            Ok(report) => {
                tracing::debug!(summary = %report.summary(), "rebuild finished");
                self.stats.succeeded += 1;
                self.on_success();
                true
            }
            Err(e) => {
                self.stats.failed += 1;
                tracing::warn!(error = %e, "rebuild failed, still watching");
                false
            }
        };

        self.state = DispatchState::Idle;
        success
    }

    fn on_success(&mut self) {
        if self.reload.is_active() {
            self.reload.notify(&self.build.context().out_dir());
            self.stats.reloads += 1;
        }

        if !self.build.context().mode().is_development() {
            return;
        }
        let Some(guard) = &self.guard else {
            return;
        };
        match guard.attempt() {
            Ok(true) => tracing::debug!("preview server launched"),
            Ok(false) => {}
            Err(e) => self.reporter.report(ProgressEvent::Error {
                stage: self.build.pipeline().serve_stage().map(|s| s.name.clone()),
                message: e.to_string(),
            }),
        }
    }

    /// Fold one event into the pending change set.
    fn absorb(&mut self, event: WatchEvent, changed: &mut Vec<PathBuf>) {
        match event {
            WatchEvent::Changed(paths) => {
                changed.extend(paths.into_iter().filter(|p| self.filter.is_relevant(p)));
            }
            WatchEvent::Error(message) => {
                self.stats.watch_errors += 1;
                self.reporter.report(ProgressEvent::Warning {
                    stage: None,
                    message: format!("Watch error: {} (continuing to watch)", message),
                });
            }
        }
    }

    /// Process events until the source closes.
    ///
    /// Each wake-up drains everything already queued (including changes
    /// made during the previous build) into a single rebuild.
    pub fn dispatch(&mut self, events: &Receiver<WatchEvent>) -> SessionStats {
        while let Ok(event) = events.recv() {
            let mut changed = Vec::new();
            self.absorb(event, &mut changed);
            while let Ok(more) = events.try_recv() {
                self.absorb(more, &mut changed);
            }

            if changed.is_empty() {
                continue;
            }
            changed.sort();
            changed.dedup();

            self.rebuild(&changed);
            println!("[{}] Watching for changes...", timestamp());
        }

        tracing::debug!("watch event source closed");
        self.stats.clone()
    }
}

/// Build once, then rebuild on every relevant change.
///
/// Blocks until the watcher shuts down (normally never; stop with Ctrl+C).
pub fn watch_and_rebuild(session: WatchSession) -> Result<SessionStats, WatchError> {
    let mut session = session;
    let ctx = session.build.context().clone();

    let paths = ctx.watch_paths();
    if let Some(missing) = paths.iter().find(|p| !p.exists()) {
        return Err(WatchError::SourceNotFound(missing.clone()));
    }

    let (tx, rx) = channel();
    let debounce = Duration::from_millis(ctx.config().watch.debounce_ms as u64);
    let mut debouncer = new_debouncer(debounce, move |result: DebounceEventResult| {
        let _ = tx.send(WatchEvent::from(result));
    })
    .map_err(WatchError::WatcherInit)?;

    for path in &paths {
        debouncer.watcher().watch(path, RecursiveMode::Recursive).map_err(WatchError::WatchPath)?;
    }

    println!("[{}] Building...", timestamp());
    session.rebuild(&[]);
    println!(
        "[{}] Watching {} for changes...",
        timestamp(),
        paths.iter().map(|p| p.display().to_string()).collect::<Vec<_>>().join(", ")
    );

    Ok(session.dispatch(&rx))
}

/// Clear the terminal screen
fn clear_screen() {
    print!("\x1B[2J\x1B[1;1H");
}

/// Get current timestamp for logging
fn timestamp() -> String {
    use std::time::SystemTime;
    let now = SystemTime::now().duration_since(SystemTime::UNIX_EPOCH).unwrap_or_default();
    let secs = now.as_secs() % 86400;
    let hours = (secs / 3600) % 24;
    let minutes = (secs / 60) % 60;
    let seconds = secs % 60;
    format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::mode::BuildMode;
    use crate::build::progress::NullProgress;
    use crate::build::stage::StageSpec;
    use crate::config::{default_config, default_stages};
    use crate::error::{SideEffectLaunchError, StageExecutionError};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc::Sender;
    use std::sync::Mutex;
    use tempfile::TempDir;

    struct CountingReload(Arc<AtomicUsize>);

    impl ReloadChannel for CountingReload {
        fn notify(&self, _out_dir: &Path) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn counting_guard() -> (Arc<SideEffectGuard>, Arc<AtomicUsize>) {
        let launches = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&launches);
        let guard = SideEffectGuard::new(move || -> Result<(), SideEffectLaunchError> {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        (Arc::new(guard), launches)
    }

    fn context(temp: &TempDir, mode: BuildMode) -> BuildContext {
        let mut config = default_config();
        config.stages = default_stages();
        BuildContext::new(config, temp.path().to_path_buf(), mode)
    }

    fn session(temp: &TempDir, mode: BuildMode) -> WatchSession {
        let build = BuildPipeline::new(context(temp, mode)).unwrap();
        WatchSession::new(build).with_reporter(NullProgress::new())
    }

    fn change(temp: &TempDir, name: &str) -> WatchEvent {
        WatchEvent::Changed(vec![temp.path().join("src").join(name)])
    }

    /// Executor that feeds the next queued event into the channel while the
    /// bundle stage runs, then closes its sender once the queue is empty.
    fn feeding_executor(
        tx: Sender<WatchEvent>,
        mut pending: Vec<WatchEvent>,
        fail_bundle: bool,
    ) -> impl StageExecutor {
        pending.reverse();
        let pending = Mutex::new(pending);
        let tx = Mutex::new(Some(tx));
        move |stage: &StageSpec, _: &BuildContext| -> Result<(), StageExecutionError> {
            if stage.name == "bundle" {
                let mut tx = tx.lock().unwrap();
                match pending.lock().unwrap().pop() {
                    Some(event) => {
                        if let Some(sender) = tx.as_ref() {
                            sender.send(event).unwrap();
                        }
                    }
                    None => {
                        tx.take();
                    }
                }
                if fail_bundle {
                    return Err(StageExecutionError::failed(&stage.name, "syntax error"));
                }
            }
            Ok(())
        }
    }

    #[test]
    fn test_three_rebuilds_launch_once_reload_thrice() {
        let temp = TempDir::new().unwrap();
        let (tx, rx) = channel();
        let (guard, launches) = counting_guard();
        let reloads = Arc::new(AtomicUsize::new(0));

        tx.send(change(&temp, "App.svelte")).unwrap();
        let executor = feeding_executor(
            tx,
            vec![change(&temp, "main.js"), change(&temp, "lib.rs")],
            false,
        );

        let mut session = session(&temp, BuildMode::Development)
            .with_executor(executor)
            .with_reload(CountingReload(Arc::clone(&reloads)))
            .with_guard(Arc::clone(&guard));

        let stats = session.dispatch(&rx);

        assert_eq!(stats.builds, 3);
        assert_eq!(stats.succeeded, 3);
        assert_eq!(launches.load(Ordering::SeqCst), 1);
        assert_eq!(reloads.load(Ordering::SeqCst), 3);
        assert_eq!(stats.reloads, 3);
        assert!(guard.has_started());
        assert_eq!(session.state(), DispatchState::Idle);
    }

    #[test]
    fn test_reloads_not_counted_without_live_reload() {
        let temp = TempDir::new().unwrap();
        let mut session = session(&temp, BuildMode::Production)
            .with_executor(|_: &StageSpec, _: &BuildContext| -> Result<(), StageExecutionError> { Ok(()) });

        assert!(session.rebuild(&[]));
        assert!(session.rebuild(&[]));
        assert_eq!(session.stats().succeeded, 2);
        assert_eq!(session.stats().reloads, 0);
    }

    #[test]
    fn test_event_during_build_schedules_another_build() {
        let temp = TempDir::new().unwrap();
        let (tx, rx) = channel();

        tx.send(change(&temp, "App.svelte")).unwrap();
        let executor = feeding_executor(tx, vec![change(&temp, "Other.svelte")], false);

        let mut session = session(&temp, BuildMode::Development).with_executor(executor);
        let (guard, _) = counting_guard();
        session = session.with_guard(guard);

        let stats = session.dispatch(&rx);
        assert_eq!(stats.builds, 2);
    }

    #[test]
    fn test_queued_events_are_coalesced() {
        let temp = TempDir::new().unwrap();
        let (tx, rx) = channel();
        for name in ["a.js", "b.js", "c.css"] {
            tx.send(change(&temp, name)).unwrap();
        }
        drop(tx);

        let builds = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&builds);
        let executor = move |stage: &StageSpec, _: &BuildContext| -> Result<(), StageExecutionError> {
            if stage.name == "bundle" {
                counter.fetch_add(1, Ordering::SeqCst);
            }
            Ok(())
        };

        let (guard, _) = counting_guard();
        let mut session =
            session(&temp, BuildMode::Development).with_executor(executor).with_guard(guard);
        let stats = session.dispatch(&rx);

        assert_eq!(stats.builds, 1);
        assert_eq!(builds.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failed_rebuild_keeps_watching_without_side_effects() {
        let temp = TempDir::new().unwrap();
        let (tx, rx) = channel();
        let (guard, launches) = counting_guard();
        let reloads = Arc::new(AtomicUsize::new(0));

        tx.send(change(&temp, "App.svelte")).unwrap();
        let executor = feeding_executor(tx, vec![change(&temp, "App.svelte")], true);

        let mut session = session(&temp, BuildMode::Development)
            .with_executor(executor)
            .with_reload(CountingReload(Arc::clone(&reloads)))
            .with_guard(Arc::clone(&guard));

        let stats = session.dispatch(&rx);

        assert_eq!(stats.builds, 2);
        assert_eq!(stats.failed, 2);
        assert_eq!(launches.load(Ordering::SeqCst), 0);
        assert_eq!(reloads.load(Ordering::SeqCst), 0);
        assert!(!guard.has_started());
    }

    #[test]
    fn test_launch_failure_does_not_fail_rebuild() {
        let temp = TempDir::new().unwrap();
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&attempts);
        let guard = Arc::new(SideEffectGuard::new(move || -> Result<(), SideEffectLaunchError> {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(SideEffectLaunchError::Other("address in use".to_string()))
        }));
        let ok = |_: &StageSpec, _: &BuildContext| -> Result<(), StageExecutionError> { Ok(()) };

        let mut session =
            session(&temp, BuildMode::Development).with_executor(ok).with_guard(Arc::clone(&guard));

        assert!(session.rebuild(&[]));
        assert!(session.rebuild(&[]));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
        assert_eq!(session.stats().succeeded, 2);
    }

    #[test]
    fn test_production_session_never_launches() {
        let temp = TempDir::new().unwrap();
        let (guard, launches) = counting_guard();
        let ok = |_: &StageSpec, _: &BuildContext| -> Result<(), StageExecutionError> { Ok(()) };

        let mut session =
            session(&temp, BuildMode::Production).with_executor(ok).with_guard(guard);
        assert!(session.rebuild(&[]));
        assert_eq!(launches.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_watch_errors_are_reported_and_ignored() {
        let temp = TempDir::new().unwrap();
        let (tx, rx) = channel();
        tx.send(WatchEvent::Error("inotify limit reached".to_string())).unwrap();
        tx.send(WatchEvent::Changed(vec![temp.path().join("README.md")])).unwrap();
        drop(tx);

        let mut session = session(&temp, BuildMode::Development);
        let stats = session.dispatch(&rx);

        assert_eq!(stats.watch_errors, 1);
        assert_eq!(stats.builds, 0);
    }

    #[test]
    fn test_default_session_wiring() {
        let temp = TempDir::new().unwrap();
        let dev = session(&temp, BuildMode::Development);
        assert!(dev.guard().is_some());
        assert_eq!(dev.state(), DispatchState::Idle);

        let prod = session(&temp, BuildMode::Production);
        assert!(prod.guard().is_none());
    }

    #[test]
    fn test_change_filter() {
        let temp = TempDir::new().unwrap();
        let mut config = default_config();
        config.watch.ignore = vec!["src/vendor/**".to_string()];
        let ctx = BuildContext::new(config, temp.path().to_path_buf(), BuildMode::Development);
        let filter = ChangeFilter::from_context(&ctx);
        let root = temp.path();

        assert!(filter.is_relevant(&root.join("src/App.svelte")));
        assert!(filter.is_relevant(&root.join("src/main.JS")));
        assert!(filter.is_relevant(&root.join("src/lib.rs")));
        assert!(!filter.is_relevant(&root.join("src/readme.md")));
        assert!(!filter.is_relevant(&root.join("src/noextension")));
        assert!(!filter.is_relevant(&root.join("public/build/bundle.js")));
        assert!(!filter.is_relevant(&root.join("src/vendor/lib.js")));
    }

    #[test]
    #[serial_test::serial]
    fn test_change_filter_with_relative_root() {
        let mut config = default_config();
        config.watch.ignore = vec!["src/vendor/**".to_string()];
        let ctx = BuildContext::new(config, PathBuf::from("web"), BuildMode::Development);
        let filter = ChangeFilter::from_context(&ctx);
        let root = std::env::current_dir().unwrap().join("web");

        assert!(filter.is_relevant(&root.join("src/App.svelte")));
        assert!(!filter.is_relevant(&root.join("src/vendor/lib.js")));
        assert!(!filter.is_relevant(&root.join("public/build/bundle.js")));
    }

    #[test]
    fn test_watch_error_source_not_found() {
        let temp = TempDir::new().unwrap();
        let session = session(&temp, BuildMode::Development);

        let result = watch_and_rebuild(session);
        assert!(matches!(result, Err(WatchError::SourceNotFound(_))));
    }

    #[test]
    fn test_watch_event_from_error() {
        let event = WatchEvent::from(Err(notify::Error::generic("boom")));
        assert!(matches!(event, WatchEvent::Error(msg) if msg.contains("boom")));
    }
}
