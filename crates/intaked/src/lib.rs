//! File-ingestion daemon for rate data.
//!
//! `intaked` watches a directory for newly created `*.xml` files and pushes
//! each one through a fixed pipeline: an unbounded hand-off queue, a single
//! consumer that classifies the file by name, sequential invocation of every
//! registered plugin for each required operation, and finally a move into the
//! archive directory under a timestamped name.
//!
//! | File name         | Operations                       |
//! |-------------------|----------------------------------|
//! | `ratehistory.xml` | `history`                        |
//! | `ratelimits.xml`  | `security`, `complex-analysis`   |
//!
//! Any other name is logged and left untouched. A plugin failure is logged
//! and isolated; it never prevents the remaining invocations or archiving.
//! Files present before the watcher attaches are not picked up, and a failed
//! archive move is not retried.
//!
//! The [`Pipeline`] owns the start/stop lifecycle. [`bootstrap_with`] wires it
//! to configuration, telemetry, and health reporting, and [`run_daemon`] adds
//! process supervision: a singleton lock, pid and health files, optional
//! daemonisation, and signal-driven shutdown.

mod archive;
mod bootstrap;
mod classify;
mod dispatch;
mod event_source;
mod health;
mod pipeline;
mod process;
mod queue;
mod telemetry;

pub use archive::{ArchiveError, ArchiveRecord, Archiver, Clock, SystemClock};
pub use bootstrap::{
    BootstrapError, ConfigLoader, Daemon, StaticConfigLoader, SystemConfigLoader, bootstrap_with,
};
pub use classify::{ClassificationRule, Classifier, HISTORY_FILE_NAME, LIMITS_FILE_NAME};
pub use dispatch::{
    ConsumerSummary, DispatchReport, Dispatcher, Disposition, FileState, InvocationOutcome,
};
pub use event_source::{DirectoryWatcher, FileEvent, FileFilter, WatchError};
pub use health::{HealthReporter, StructuredHealthReporter};
pub use pipeline::{
    ManifestPluginLoader, Pipeline, PipelineSettings, PipelineState, PluginLoader, StartError,
    StaticPluginLoader, StopReport,
};
pub use process::{
    Artefact, Daemonizer, LaunchError, LaunchMode, ShutdownCause, ShutdownError, ShutdownSignal,
    SystemDaemonizer, SystemShutdownSignal, run_daemon,
};
pub use queue::{CancellationToken, HandoffQueue, Pop, QueueClosed};
pub use telemetry::{TelemetryError, TelemetryHandle};

#[cfg(test)]
mod tests;
