//! Lifecycle controller wiring the watcher, queue, and consumer together.
//!
//! [`Pipeline::start`] loads the plugin registry, prepares the archive
//! directory, attaches the directory watcher, and spawns the single consumer
//! thread. [`Pipeline::stop`] detaches the watcher, cancels the consumer, and
//! waits up to the configured shutdown timeout for it to finish the
//! invocation in flight. Items still queued when the consumer exits are
//! logged and discarded; their files stay in the watched directory.

use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use intake_config::Config;
use intake_plugins::{PluginError, PluginRegistry};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::archive::{ArchiveError, Archiver, Clock, SystemClock};
use crate::classify::Classifier;
use crate::dispatch::{ConsumerSummary, Dispatcher};
use crate::event_source::{DirectoryWatcher, FileEvent, FileFilter, WatchError};
use crate::queue::{CancellationToken, HandoffQueue};

const PIPELINE_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::pipeline");
const CONSUMER_THREAD_NAME: &str = "intake-consumer";

/// Controller state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    /// Nothing is watched and no consumer runs.
    Stopped,
    /// Files are being watched and dispatched.
    Running,
    /// Shutdown is in progress.
    Stopping,
}

impl PipelineState {
    /// Lower-case label used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Stopped => "stopped",
            Self::Running => "running",
            Self::Stopping => "stopping",
        }
    }
}

impl std::fmt::Display for PipelineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Builds the plugin registry at startup.
pub trait PluginLoader: Send + Sync {
    /// Loads every processor available in `plugin_dir`.
    ///
    /// # Errors
    ///
    /// Returns a [`PluginError`] when the directory or a manifest is unusable.
    fn load(&self, plugin_dir: &Path) -> Result<PluginRegistry, PluginError>;
}

/// Loader that scans the plugin directory for manifests.
#[derive(Debug, Default, Clone, Copy)]
pub struct ManifestPluginLoader;

impl PluginLoader for ManifestPluginLoader {
    fn load(&self, plugin_dir: &Path) -> Result<PluginRegistry, PluginError> {
        PluginRegistry::discover(plugin_dir)
    }
}

/// Loader that returns a pre-built registry, ignoring the plugin directory.
#[derive(Debug, Clone, Default)]
pub struct StaticPluginLoader {
    registry: PluginRegistry,
}

impl StaticPluginLoader {
    /// Wraps an existing registry.
    #[must_use]
    pub const fn new(registry: PluginRegistry) -> Self {
        Self { registry }
    }
}

impl PluginLoader for StaticPluginLoader {
    fn load(&self, _plugin_dir: &Path) -> Result<PluginRegistry, PluginError> {
        Ok(self.registry.clone())
    }
}

/// Directories and limits the pipeline runs with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineSettings {
    watched_dir: PathBuf,
    archive_dir: PathBuf,
    plugin_dir: PathBuf,
    file_pattern: String,
    shutdown_timeout: Duration,
}

impl PipelineSettings {
    /// Settings with the default `*.xml` pattern and shutdown timeout.
    #[must_use]
    pub fn new(
        watched_dir: impl Into<PathBuf>,
        archive_dir: impl Into<PathBuf>,
        plugin_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            watched_dir: watched_dir.into(),
            archive_dir: archive_dir.into(),
            plugin_dir: plugin_dir.into(),
            file_pattern: intake_config::DEFAULT_FILE_PATTERN.to_owned(),
            shutdown_timeout: Duration::from_secs(intake_config::DEFAULT_SHUTDOWN_TIMEOUT_SECS),
        }
    }

    /// Extracts pipeline settings from the daemon configuration.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.watched_dir(),
            config.archive_dir(),
            config.plugin_dir(),
        )
        .with_file_pattern(config.file_pattern())
        .with_shutdown_timeout(config.shutdown_timeout())
    }

    /// Overrides the file name glob.
    #[must_use]
    pub fn with_file_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.file_pattern = pattern.into();
        self
    }

    /// Overrides the bounded wait used by [`Pipeline::stop`].
    #[must_use]
    pub const fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Directory observed for new files.
    #[must_use]
    pub fn watched_dir(&self) -> &Path {
        &self.watched_dir
    }

    /// Directory receiving dispatched files.
    #[must_use]
    pub fn archive_dir(&self) -> &Path {
        &self.archive_dir
    }

    /// Directory scanned for plugins.
    #[must_use]
    pub fn plugin_dir(&self) -> &Path {
        &self.plugin_dir
    }

    /// File name glob.
    #[must_use]
    pub const fn file_pattern(&self) -> &str {
        self.file_pattern.as_str()
    }

    /// Bounded wait for the consumer during shutdown.
    #[must_use]
    pub const fn shutdown_timeout(&self) -> Duration {
        self.shutdown_timeout
    }
}

/// Errors that prevent the pipeline from starting. All are fatal.
#[derive(Debug, Error)]
pub enum StartError {
    /// `start` was called while the pipeline was not stopped.
    #[error("pipeline is already {state}")]
    AlreadyRunning {
        /// State observed when `start` was called.
        state: PipelineState,
    },
    /// Plugin discovery failed.
    #[error("failed to load plugins: {0}")]
    Plugins(#[from] PluginError),
    /// The archive directory could not be prepared.
    #[error("failed to prepare archive: {0}")]
    Archive(#[from] ArchiveError),
    /// The watcher could not be attached.
    #[error("failed to watch for files: {0}")]
    Watch(#[from] WatchError),
    /// The consumer thread could not be spawned.
    #[error("failed to spawn consumer thread: {source}")]
    Consumer {
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },
}

/// What [`Pipeline::stop`] observed while shutting down.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StopReport {
    /// Totals from the consumer, when it exited within the timeout.
    pub summary: Option<ConsumerSummary>,
    /// Files that were queued but never dispatched.
    pub abandoned: Vec<PathBuf>,
    /// `true` when the consumer was still busy after the timeout.
    pub timed_out: bool,
}

struct Running {
    watcher: DirectoryWatcher,
    queue: Arc<HandoffQueue<FileEvent>>,
    cancel: CancellationToken,
    consumer: JoinHandle<ConsumerSummary>,
    finished: mpsc::Receiver<()>,
}

/// Start/stop controller for the ingestion pipeline.
pub struct Pipeline {
    settings: PipelineSettings,
    loader: Arc<dyn PluginLoader>,
    clock: Arc<dyn Clock>,
    state: PipelineState,
    running: Option<Running>,
}

impl Pipeline {
    /// Creates a stopped pipeline using the wall clock for archive names.
    #[must_use]
    pub fn new(settings: PipelineSettings, loader: Arc<dyn PluginLoader>) -> Self {
        Self::with_clock(settings, loader, Arc::new(SystemClock))
    }

    /// Creates a stopped pipeline with an explicit archive clock.
    #[must_use]
    pub fn with_clock(
        settings: PipelineSettings,
        loader: Arc<dyn PluginLoader>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            settings,
            loader,
            clock,
            state: PipelineState::Stopped,
            running: None,
        }
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> PipelineState {
        self.state
    }

    /// Settings in use.
    #[must_use]
    pub const fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Number of files waiting for the consumer.
    #[must_use]
    pub fn queued(&self) -> usize {
        self.running
            .as_ref()
            .map_or(0, |running| running.queue.len())
    }

    /// Loads plugins, attaches the watcher, and spawns the consumer.
    ///
    /// Files already present in the watched directory are not processed.
    ///
    /// # Errors
    ///
    /// Returns a [`StartError`] if the pipeline is not stopped or any
    /// component fails to initialise. The pipeline stays stopped on error.
    pub fn start(&mut self) -> Result<(), StartError> {
        if self.state != PipelineState::Stopped {
            return Err(StartError::AlreadyRunning { state: self.state });
        }
        let settings = &self.settings;
        let registry = self.loader.load(settings.plugin_dir())?;
        info!(
            target: PIPELINE_TARGET,
            plugins = ?registry.names(),
            "plugins loaded"
        );
        let archiver = Archiver::with_clock(settings.archive_dir(), Arc::clone(&self.clock));
        archiver.prepare()?;
        let filter = FileFilter::new(settings.file_pattern())?;

        let queue = Arc::new(HandoffQueue::new());
        let watcher = DirectoryWatcher::attach(settings.watched_dir(), filter, Arc::clone(&queue))?;

        let cancel = CancellationToken::new();
        let dispatcher = Dispatcher::new(Classifier::default(), registry, archiver);
        let (done, finished) = mpsc::channel();
        let consumer_queue = Arc::clone(&queue);
        let consumer_cancel = cancel.clone();
        let spawned = thread::Builder::new()
            .name(CONSUMER_THREAD_NAME.to_owned())
            .spawn(move || {
                let summary = dispatcher.run(&consumer_queue, &consumer_cancel);
                if done.send(()).is_err() {
                    warn!(
                        target: PIPELINE_TARGET,
                        "controller stopped waiting before the consumer finished"
                    );
                }
                summary
            });
        let consumer = match spawned {
            Ok(handle) => handle,
            Err(source) => {
                watcher.detach();
                return Err(StartError::Consumer { source });
            }
        };

        self.running = Some(Running {
            watcher,
            queue,
            cancel,
            consumer,
            finished,
        });
        self.transition(PipelineState::Running);
        Ok(())
    }

    /// Stops watching, cancels the consumer, and waits for it to exit.
    ///
    /// Calling `stop` on a stopped pipeline returns an empty report. A
    /// consumer still busy after the shutdown timeout is left to finish its
    /// current invocation in the background; it starts no new ones.
    pub fn stop(&mut self) -> StopReport {
        let Some(running) = self.running.take() else {
            return StopReport::default();
        };
        self.transition(PipelineState::Stopping);
        let Running {
            watcher,
            queue,
            cancel,
            consumer,
            finished,
        } = running;

        watcher.detach();
        cancel.cancel();
        queue.close();

        let timeout = self.settings.shutdown_timeout();
        let mut report = StopReport::default();
        match finished.recv_timeout(timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => match consumer.join() {
                Ok(summary) => report.summary = Some(summary),
                Err(_) => error!(
                    target: PIPELINE_TARGET,
                    "consumer thread panicked"
                ),
            },
            Err(RecvTimeoutError::Timeout) => {
                warn!(
                    target: PIPELINE_TARGET,
                    timeout_ms = timeout.as_millis(),
                    "consumer still busy after shutdown timeout; detaching"
                );
                report.timed_out = true;
            }
        }

        for event in queue.drain() {
            warn!(
                target: PIPELINE_TARGET,
                file = %event.path().display(),
                "queued file abandoned at shutdown"
            );
            report.abandoned.push(event.path().to_path_buf());
        }
        self.transition(PipelineState::Stopped);
        report
    }

    fn transition(&mut self, next: PipelineState) {
        info!(
            target: PIPELINE_TARGET,
            from = %self.state,
            to = %next,
            "pipeline state changed"
        );
        self.state = next;
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("settings", &self.settings)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        if self.running.is_some() {
            drop(self.stop());
        }
    }
}
