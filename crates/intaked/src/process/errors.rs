//! Failures that stop the supervisor before or while it hosts the pipeline.

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use daemonize_me::DaemonError;
use intake_config::RuntimePathsError;
use nix::errno::Errno;
use ortho_config::OrthoError;
use thiserror::Error;

use crate::bootstrap::BootstrapError;

use super::shutdown::ShutdownError;

/// Runtime file or directory the supervisor manages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Artefact {
    /// Directory holding the other artefacts.
    Directory,
    /// Singleton lock file.
    Lock,
    /// File recording the daemon's pid.
    Pid,
    /// JSON health snapshot.
    Health,
}

impl fmt::Display for Artefact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Directory => "runtime directory",
            Self::Lock => "lock file",
            Self::Pid => "pid file",
            Self::Health => "health snapshot",
        })
    }
}

/// Errors surfaced while launching or supervising the daemon process.
#[derive(Debug, Error)]
pub enum LaunchError {
    /// Configuration failed to load.
    #[error("failed to load configuration: {source}")]
    Config {
        /// Underlying loader error.
        #[from]
        source: Arc<OrthoError>,
    },
    /// Relative directories could not be anchored to the launch directory.
    #[error("failed to resolve launch directory: {source}")]
    WorkingDirectory {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// A runtime artefact could not be created, written, or cleared.
    #[error("failed to prepare {artefact} '{}': {source}", path.display())]
    Artefact {
        /// Which artefact failed.
        artefact: Artefact,
        /// Its location.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// A live daemon already holds the lock.
    #[error("intaked is already running with pid {pid}")]
    AlreadyRunning {
        /// PID recorded by the running daemon.
        pid: u32,
    },
    /// The pid left by a previous daemon could not be checked for liveness.
    #[error("failed to check previous daemon {pid}: {source}")]
    Liveness {
        /// PID read from the pid file.
        pid: u32,
        /// Underlying OS error.
        #[source]
        source: Errno,
    },
    /// Detaching into the background failed.
    #[error("failed to detach from the console: {source}")]
    Detach {
        /// Underlying daemonisation error.
        #[from]
        source: DaemonError,
    },
    /// Waiting for a shutdown signal failed.
    #[error(transparent)]
    Shutdown(#[from] ShutdownError),
    /// Configuration, telemetry, or pipeline startup failed.
    #[error("daemon bootstrap failed: {source}")]
    Bootstrap {
        /// Underlying bootstrap error.
        #[from]
        source: BootstrapError,
    },
}

impl LaunchError {
    pub(super) fn artefact(artefact: Artefact, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Artefact {
            artefact,
            path: path.into(),
            source,
        }
    }
}

impl From<RuntimePathsError> for LaunchError {
    fn from(error: RuntimePathsError) -> Self {
        let RuntimePathsError::RuntimeDirectory { path, source } = error;
        Self::artefact(Artefact::Directory, path, source)
    }
}
