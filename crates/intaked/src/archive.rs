//! Moves dispatched files into the archive directory.
//!
//! Each file is renamed to `{stem}_{YYYYMMDDHHMMSS}{.ext}` using the UTC time
//! of archiving. Two files with the same name archived within the same second
//! map to the same destination; the second move is refused with
//! [`ArchiveError::DestinationExists`] and its source stays where it was.
//! Failed moves are never retried.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use time::OffsetDateTime;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use tracing::{error, info};

const ARCHIVE_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::archive");

const SUFFIX_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year][month][day][hour][minute][second]");

/// Source of the archive timestamp.
pub trait Clock: Send + Sync {
    /// Current instant.
    fn now(&self) -> OffsetDateTime;
}

/// Wall clock in UTC.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

/// Where an archived file ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveRecord {
    original: PathBuf,
    destination: PathBuf,
    suffix: String,
}

impl ArchiveRecord {
    /// Path the file was moved from.
    #[must_use]
    pub fn original(&self) -> &Path {
        &self.original
    }

    /// Path the file was moved to.
    #[must_use]
    pub fn destination(&self) -> &Path {
        &self.destination
    }

    /// The `YYYYMMDDHHMMSS` suffix used.
    #[must_use]
    pub const fn suffix(&self) -> &str {
        self.suffix.as_str()
    }
}

/// Errors raised while archiving a file.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// The archive directory could not be created.
    #[error("failed to create archive directory '{}': {source}", path.display())]
    CreateDirectory {
        /// Archive directory.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: Arc<io::Error>,
    },
    /// The source path has no file name to derive a destination from.
    #[error("'{}' has no file name", path.display())]
    MissingFileName {
        /// Offending path.
        path: PathBuf,
    },
    /// A file already occupies the computed destination.
    #[error("archive destination '{}' already exists", destination.display())]
    DestinationExists {
        /// Occupied destination.
        destination: PathBuf,
    },
    /// Moving the file failed.
    #[error("failed to move '{}' to '{}': {source}", from.display(), to.display())]
    Move {
        /// Source path.
        from: PathBuf,
        /// Intended destination.
        to: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: Arc<io::Error>,
    },
    /// The timestamp suffix could not be formatted.
    #[error("failed to format archive timestamp: {0}")]
    Timestamp(#[from] time::error::Format),
}

/// Moves files into a single archive directory.
#[derive(Clone)]
pub struct Archiver {
    directory: PathBuf,
    clock: Arc<dyn Clock>,
}

impl Archiver {
    /// Archives into `directory` using the system clock.
    #[must_use]
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self::with_clock(directory, Arc::new(SystemClock))
    }

    /// Archives into `directory` using an explicit clock.
    #[must_use]
    pub fn with_clock(directory: impl Into<PathBuf>, clock: Arc<dyn Clock>) -> Self {
        Self {
            directory: directory.into(),
            clock,
        }
    }

    /// Archive directory.
    #[must_use]
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Creates the archive directory if it is absent.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError::CreateDirectory`] when creation fails.
    pub fn prepare(&self) -> Result<(), ArchiveError> {
        fs::create_dir_all(&self.directory).map_err(|source| ArchiveError::CreateDirectory {
            path: self.directory.clone(),
            source: Arc::new(source),
        })
    }

    /// Computes the destination `path` would be archived to at `at`.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError::MissingFileName`] for paths without a file
    /// name, or [`ArchiveError::Timestamp`] if formatting fails.
    pub fn destination_for(
        &self,
        path: &Path,
        at: OffsetDateTime,
    ) -> Result<(PathBuf, String), ArchiveError> {
        let stem = path
            .file_stem()
            .ok_or_else(|| ArchiveError::MissingFileName {
                path: path.to_path_buf(),
            })?
            .to_string_lossy();
        let extension = path
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy()))
            .unwrap_or_default();
        let suffix = at.format(SUFFIX_FORMAT)?;
        let destination = self.directory.join(format!("{stem}_{suffix}{extension}"));
        Ok((destination, suffix))
    }

    /// Moves `path` into the archive directory.
    ///
    /// On failure the source is left in place.
    ///
    /// # Errors
    ///
    /// Returns an [`ArchiveError`] describing why the move did not happen.
    pub fn archive(&self, path: &Path) -> Result<ArchiveRecord, ArchiveError> {
        let result = self.move_into_archive(path);
        match &result {
            Ok(record) => info!(
                target: ARCHIVE_TARGET,
                file = %path.display(),
                destination = %record.destination().display(),
                "file archived"
            ),
            Err(failure) => error!(
                target: ARCHIVE_TARGET,
                file = %path.display(),
                error = %failure,
                "archiving failed; file left in place"
            ),
        }
        result
    }

    fn move_into_archive(&self, path: &Path) -> Result<ArchiveRecord, ArchiveError> {
        let (destination, suffix) = self.destination_for(path, self.clock.now())?;
        self.prepare()?;
        let occupied = destination.try_exists().map_err(|source| ArchiveError::Move {
            from: path.to_path_buf(),
            to: destination.clone(),
            source: Arc::new(source),
        })?;
        if occupied {
            return Err(ArchiveError::DestinationExists { destination });
        }
        move_file(path, &destination).map_err(|source| ArchiveError::Move {
            from: path.to_path_buf(),
            to: destination.clone(),
            source: Arc::new(source),
        })?;
        Ok(ArchiveRecord {
            original: path.to_path_buf(),
            destination,
            suffix,
        })
    }
}

impl std::fmt::Debug for Archiver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Archiver")
            .field("directory", &self.directory)
            .finish_non_exhaustive()
    }
}

/// Renames `from` to `to`, copying across filesystems when rename cannot.
fn move_file(from: &Path, to: &Path) -> io::Result<()> {
    match fs::rename(from, to) {
        Err(error) if error.kind() == io::ErrorKind::CrossesDevices => {
            fs::copy(from, to)?;
            fs::remove_file(from).inspect_err(|_| {
                fs::remove_file(to).ok();
            })
        }
        other => other,
    }
}
