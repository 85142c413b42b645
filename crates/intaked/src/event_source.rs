//! Filesystem notifications turned into queued [`FileEvent`]s.
//!
//! The [`DirectoryWatcher`] subscribes to a single directory (non-recursive)
//! and pushes the absolute path of every file that appears in it under a name
//! matching the configured glob: either created in place or renamed into
//! place, as producers that write to a temporary name and then rename do.
//! Pushing never blocks the notification thread. Files already present when
//! watching starts are not reported, and events missed by the platform
//! backend are not retried.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use glob::{MatchOptions, Pattern};
use notify::event::{CreateKind, ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{debug, info, warn};

use crate::queue::HandoffQueue;

const WATCH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::watch");

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: false,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// A newly created file awaiting dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEvent {
    path: PathBuf,
    discovered_at: OffsetDateTime,
}

impl FileEvent {
    /// Records a file discovered now.
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            discovered_at: OffsetDateTime::now_utc(),
        }
    }

    /// Absolute path of the created file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// When the notification was received.
    #[must_use]
    pub const fn timestamp(&self) -> OffsetDateTime {
        self.discovered_at
    }
}

/// Errors raised while attaching to the watched directory.
#[derive(Debug, Error)]
pub enum WatchError {
    /// The file name glob is not a valid pattern.
    #[error("invalid file pattern '{pattern}': {source}")]
    Pattern {
        /// Pattern supplied in configuration.
        pattern: String,
        /// Underlying parse error.
        #[source]
        source: glob::PatternError,
    },
    /// The watched directory does not exist or cannot be resolved.
    #[error("watched directory '{}' is unavailable: {source}", path.display())]
    Directory {
        /// Configured directory.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The notification backend could not be created.
    #[error("failed to create filesystem watcher: {source}")]
    Create {
        /// Underlying backend error.
        #[source]
        source: notify::Error,
    },
    /// The backend refused to watch the directory.
    #[error("failed to watch '{}': {source}", path.display())]
    Attach {
        /// Directory that could not be watched.
        path: PathBuf,
        /// Underlying backend error.
        #[source]
        source: notify::Error,
    },
}

/// Case-insensitive glob applied to file names.
#[derive(Debug, Clone)]
pub struct FileFilter {
    pattern: Pattern,
}

impl FileFilter {
    /// Compiles a file name glob such as `*.xml`.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::Pattern`] when the glob is malformed.
    pub fn new(pattern: &str) -> Result<Self, WatchError> {
        let compiled = Pattern::new(pattern).map_err(|source| WatchError::Pattern {
            pattern: pattern.to_owned(),
            source,
        })?;
        Ok(Self { pattern: compiled })
    }

    /// Returns `true` when the final component of `path` matches.
    #[must_use]
    pub fn matches(&self, path: &Path) -> bool {
        path.file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| self.pattern.matches_with(name, MATCH_OPTIONS))
    }
}

/// Active subscription to creation events in one directory.
///
/// Dropping the watcher stops notifications.
pub struct DirectoryWatcher {
    watcher: RecommendedWatcher,
    directory: PathBuf,
}

impl DirectoryWatcher {
    /// Starts watching `directory`, pushing matching files into `queue`.
    ///
    /// # Errors
    ///
    /// Returns a [`WatchError`] when the directory cannot be resolved or the
    /// platform backend cannot watch it.
    pub fn attach(
        directory: &Path,
        filter: FileFilter,
        queue: Arc<HandoffQueue<FileEvent>>,
    ) -> Result<Self, WatchError> {
        let resolved = fs::canonicalize(directory).map_err(|source| WatchError::Directory {
            path: directory.to_path_buf(),
            source,
        })?;
        let mut watcher = RecommendedWatcher::new(
            move |result: notify::Result<Event>| match result {
                Ok(event) => {
                    route_event(&event, &filter, &queue);
                }
                Err(error) => {
                    warn!(
                        target: WATCH_TARGET,
                        error = %error,
                        "filesystem watcher reported an error"
                    );
                }
            },
            notify::Config::default(),
        )
        .map_err(|source| WatchError::Create { source })?;
        watcher
            .watch(&resolved, RecursiveMode::NonRecursive)
            .map_err(|source| WatchError::Attach {
                path: resolved.clone(),
                source,
            })?;
        info!(
            target: WATCH_TARGET,
            directory = %resolved.display(),
            "watching for new files"
        );
        Ok(Self {
            watcher,
            directory: resolved,
        })
    }

    /// Canonical path of the watched directory.
    #[must_use]
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Stops delivering notifications.
    pub fn detach(mut self) {
        if let Err(error) = self.watcher.unwatch(&self.directory) {
            debug!(
                target: WATCH_TARGET,
                directory = %self.directory.display(),
                error = %error,
                "unwatch failed; dropping watcher"
            );
        }
        info!(
            target: WATCH_TARGET,
            directory = %self.directory.display(),
            "stopped watching"
        );
    }
}

impl std::fmt::Debug for DirectoryWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectoryWatcher")
            .field("directory", &self.directory)
            .finish_non_exhaustive()
    }
}

/// Pushes every matching file that `event` reports as newly present,
/// returning how many were queued.
///
/// A rename reports the old name and the new name separately; only the new
/// name (`RenameMode::To`) counts, so a file renamed within the directory is
/// queued once.
pub(crate) fn route_event(
    event: &Event,
    filter: &FileFilter,
    queue: &HandoffQueue<FileEvent>,
) -> usize {
    if !matches!(
        event.kind,
        EventKind::Create(CreateKind::File | CreateKind::Any)
            | EventKind::Modify(ModifyKind::Name(RenameMode::To))
    ) {
        return 0;
    }
    let mut queued = 0;
    for path in event.paths.iter().filter(|path| filter.matches(path)) {
        match queue.push(FileEvent::new(path.clone())) {
            Ok(()) => {
                queued += 1;
                debug!(
                    target: WATCH_TARGET,
                    file = %path.display(),
                    "file enqueued"
                );
            }
            Err(error) => {
                warn!(
                    target: WATCH_TARGET,
                    file = %path.display(),
                    error = %error,
                    "dropping notification received during shutdown"
                );
            }
        }
    }
    queued
}
