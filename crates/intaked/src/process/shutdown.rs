//! Blocks the supervisor until the daemon is asked to stop.

use std::fmt;
use std::io;

use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGQUIT, SIGTERM};
use signal_hook::iterator::Signals;
use thiserror::Error;
use tracing::info;

use super::PROCESS_TARGET;

/// Abstraction over shutdown notification mechanisms.
pub trait ShutdownSignal: Send + Sync {
    /// Blocks until shutdown should proceed and reports what triggered it.
    ///
    /// # Errors
    ///
    /// Returns a [`ShutdownError`] when the notification source cannot be
    /// installed.
    fn wait(&self) -> Result<ShutdownCause, ShutdownError>;
}

/// What asked the daemon to stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownCause {
    /// A termination signal was delivered to the process.
    Signal(i32),
    /// The listener returned without a signal, for example when an embedding
    /// host requested the stop directly.
    Requested,
}

impl ShutdownCause {
    /// Returns `true` for a console interrupt (Ctrl-C).
    #[must_use]
    pub const fn is_interrupt(self) -> bool {
        matches!(self, Self::Signal(SIGINT))
    }
}

impl fmt::Display for ShutdownCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Signal(SIGINT) => f.write_str("interrupt"),
            Self::Signal(SIGTERM) => f.write_str("terminate"),
            Self::Signal(SIGQUIT) => f.write_str("quit"),
            Self::Signal(SIGHUP) => f.write_str("hangup"),
            Self::Signal(other) => write!(f, "signal {other}"),
            Self::Requested => f.write_str("requested"),
        }
    }
}

/// Errors reported by shutdown signal listeners.
#[derive(Debug, Error)]
pub enum ShutdownError {
    /// Installing signal handlers failed.
    #[error("failed to install signal handlers: {source}")]
    Install {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}

/// Shutdown listener backed by `signal-hook`.
///
/// Interrupt, terminate, quit, and hangup all stop the daemon.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemShutdownSignal;

impl SystemShutdownSignal {
    /// Builds a signal listener.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl ShutdownSignal for SystemShutdownSignal {
    fn wait(&self) -> Result<ShutdownCause, ShutdownError> {
        let mut signals = Signals::new([SIGTERM, SIGINT, SIGQUIT, SIGHUP])
            .map_err(|source| ShutdownError::Install { source })?;
        let cause = signals
            .forever()
            .next()
            .map_or(ShutdownCause::Requested, ShutdownCause::Signal);
        info!(
            target: PROCESS_TARGET,
            %cause,
            "shutdown requested"
        );
        Ok(cause)
    }
}
