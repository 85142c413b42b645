//! Classification, plugin invocation, and archiving for each queued file.
//!
//! A file moves through `Classified → Dispatching → Archived | Failed`, or
//! stops at `Unrecognized` when no rule matches. Every required operation is
//! invoked on every registered processor, sequentially and in registry order.
//! Each invocation's result is recorded as an [`InvocationOutcome`]; a failure
//! is logged and never stops the remaining invocations or the archive step.
//!
//! Cancellation is checked before each invocation. Once it is observed, no
//! new invocation starts and the file is left in place.

use std::path::{Path, PathBuf};

use intake_plugins::{Operation, PluginError, PluginRegistry};
use time::OffsetDateTime;
use tracing::{debug, info, warn};

use crate::archive::{ArchiveError, ArchiveRecord, Archiver};
use crate::classify::Classifier;
use crate::event_source::FileEvent;
use crate::queue::{CancellationToken, HandoffQueue, Pop};

const DISPATCH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::dispatch");

/// Per-file processing state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileState {
    /// No rule matched; the file is left untouched.
    Unrecognized,
    /// A rule matched and dispatch has not begun.
    Classified,
    /// Plugin invocations are running.
    Dispatching,
    /// The file was moved to the archive.
    Archived,
    /// Dispatch finished but the file could not be archived, or shutdown
    /// interrupted dispatch.
    Failed,
}

impl FileState {
    /// Lower-case label used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unrecognized => "unrecognized",
            Self::Classified => "classified",
            Self::Dispatching => "dispatching",
            Self::Archived => "archived",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for FileState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of invoking one operation on one processor.
#[derive(Debug)]
pub struct InvocationOutcome {
    plugin: String,
    operation: Operation,
    result: Result<(), PluginError>,
}

impl InvocationOutcome {
    /// Name of the processor invoked.
    #[must_use]
    pub const fn plugin(&self) -> &str {
        self.plugin.as_str()
    }

    /// Operation invoked.
    #[must_use]
    pub const fn operation(&self) -> Operation {
        self.operation
    }

    /// The processor's result.
    #[must_use]
    pub const fn result(&self) -> &Result<(), PluginError> {
        &self.result
    }

    /// Returns `true` if the invocation succeeded.
    #[must_use]
    pub const fn succeeded(&self) -> bool {
        self.result.is_ok()
    }
}

/// What happened to the file once dispatch ended.
#[derive(Debug)]
pub enum Disposition {
    /// No rule matched; nothing was invoked or moved.
    Unrecognized,
    /// Dispatch completed and the file was archived.
    Archived(ArchiveRecord),
    /// Dispatch completed but archiving failed; the file stays in place.
    ArchiveFailed(ArchiveError),
    /// Cancellation stopped dispatch before every invocation ran; the file
    /// stays in place.
    Abandoned,
}

/// Everything observed while dispatching one file.
#[derive(Debug)]
pub struct DispatchReport {
    path: PathBuf,
    outcomes: Vec<InvocationOutcome>,
    disposition: Disposition,
}

impl DispatchReport {
    /// File the report describes.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Invocation outcomes in the order they ran.
    #[must_use]
    pub fn outcomes(&self) -> &[InvocationOutcome] {
        &self.outcomes
    }

    /// Final disposition.
    #[must_use]
    pub const fn disposition(&self) -> &Disposition {
        &self.disposition
    }

    /// Terminal state of the file.
    #[must_use]
    pub const fn state(&self) -> FileState {
        match self.disposition {
            Disposition::Unrecognized => FileState::Unrecognized,
            Disposition::Archived(_) => FileState::Archived,
            Disposition::ArchiveFailed(_) | Disposition::Abandoned => FileState::Failed,
        }
    }

    /// Number of failed invocations.
    #[must_use]
    pub fn failures(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|outcome| !outcome.succeeded())
            .count()
    }
}

/// Totals reported when the consumer loop exits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsumerSummary {
    /// Files taken from the queue.
    pub dispatched: usize,
    /// Files moved to the archive.
    pub archived: usize,
    /// Files with no matching rule.
    pub unrecognized: usize,
    /// Files that could not be archived or were interrupted.
    pub failed: usize,
}

impl ConsumerSummary {
    fn record(&mut self, state: FileState) {
        self.dispatched += 1;
        match state {
            FileState::Archived => self.archived += 1,
            FileState::Unrecognized => self.unrecognized += 1,
            FileState::Failed | FileState::Classified | FileState::Dispatching => {
                self.failed += 1;
            }
        }
    }
}

/// Classifies files and drives them through the registered processors.
#[derive(Debug)]
pub struct Dispatcher {
    classifier: Classifier,
    registry: PluginRegistry,
    archiver: Archiver,
}

impl Dispatcher {
    /// Assembles a dispatcher.
    #[must_use]
    pub const fn new(classifier: Classifier, registry: PluginRegistry, archiver: Archiver) -> Self {
        Self {
            classifier,
            registry,
            archiver,
        }
    }

    /// Registered processors.
    #[must_use]
    pub const fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    /// Processes one file end to end.
    #[must_use]
    pub fn dispatch(&self, event: &FileEvent, cancel: &CancellationToken) -> DispatchReport {
        let path = event.path();
        let Some(rule) = self.classifier.classify(path) else {
            warn!(
                target: DISPATCH_TARGET,
                file = %path.display(),
                "unrecognized file left in place"
            );
            return DispatchReport {
                path: path.to_path_buf(),
                outcomes: Vec::new(),
                disposition: Disposition::Unrecognized,
            };
        };
        info!(
            target: DISPATCH_TARGET,
            file = %path.display(),
            discovered_at = %event.timestamp(),
            queued_for = %(OffsetDateTime::now_utc() - event.timestamp()),
            rule = rule.file_name(),
            operations = rule.operations().len(),
            plugins = self.registry.len(),
            "file classified"
        );
        transition(path, FileState::Classified, FileState::Dispatching);

        let mut outcomes = Vec::with_capacity(rule.operations().len() * self.registry.len());
        for &operation in rule.operations() {
            for handle in self.registry.handles() {
                if cancel.is_cancelled() {
                    warn!(
                        target: DISPATCH_TARGET,
                        file = %path.display(),
                        completed = outcomes.len(),
                        "shutdown interrupted dispatch; file left in place"
                    );
                    transition(path, FileState::Dispatching, FileState::Failed);
                    return DispatchReport {
                        path: path.to_path_buf(),
                        outcomes,
                        disposition: Disposition::Abandoned,
                    };
                }
                let result = handle.invoke(operation, path);
                if let Err(error) = &result {
                    warn!(
                        target: DISPATCH_TARGET,
                        file = %path.display(),
                        plugin = handle.name(),
                        %operation,
                        error = %error,
                        "plugin invocation failed"
                    );
                }
                outcomes.push(InvocationOutcome {
                    plugin: handle.name().to_owned(),
                    operation,
                    result,
                });
            }
        }

        let succeeded = outcomes.iter().filter(|outcome| outcome.succeeded()).count();
        info!(
            target: DISPATCH_TARGET,
            file = %path.display(),
            succeeded,
            failed = outcomes.len() - succeeded,
            "dispatch finished"
        );

        let disposition = match self.archiver.archive(path) {
            Ok(record) => {
                transition(path, FileState::Dispatching, FileState::Archived);
                Disposition::Archived(record)
            }
            Err(error) => {
                transition(path, FileState::Dispatching, FileState::Failed);
                Disposition::ArchiveFailed(error)
            }
        };
        DispatchReport {
            path: path.to_path_buf(),
            outcomes,
            disposition,
        }
    }

    /// Consumes `queue` until cancellation, dispatching each file in order.
    #[must_use]
    pub fn run(
        &self,
        queue: &HandoffQueue<FileEvent>,
        cancel: &CancellationToken,
    ) -> ConsumerSummary {
        let mut summary = ConsumerSummary::default();
        while let Pop::Item(event) = queue.pop(cancel) {
            let report = self.dispatch(&event, cancel);
            summary.record(report.state());
        }
        debug!(
            target: DISPATCH_TARGET,
            dispatched = summary.dispatched,
            archived = summary.archived,
            unrecognized = summary.unrecognized,
            failed = summary.failed,
            "consumer loop exiting"
        );
        summary
    }
}

fn transition(path: &Path, from: FileState, to: FileState) {
    debug!(
        target: DISPATCH_TARGET,
        file = %path.display(),
        %from,
        %to,
        "file state changed"
    );
}

#[cfg(test)]
mod tests;
