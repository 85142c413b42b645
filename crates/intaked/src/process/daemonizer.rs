//! Background detachment for [`LaunchMode::Background`](super::LaunchMode).

use std::ffi::OsStr;
use std::path::Path;

use daemonize_me::{Daemon, DaemonError};
use tracing::info;

use super::PROCESS_TARGET;

/// Forks the supervisor away from its console.
pub trait Daemonizer: Send + Sync {
    /// Detaches into the background and changes directory to `work_dir`.
    /// Only the child returns.
    ///
    /// # Errors
    ///
    /// Returns the backend's [`DaemonError`] when forking or session setup
    /// fails.
    fn detach(&self, work_dir: &Path) -> Result<(), DaemonError>;
}

/// Detaches with `daemonize-me`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemDaemonizer;

impl Daemonizer for SystemDaemonizer {
    fn detach(&self, work_dir: &Path) -> Result<(), DaemonError> {
        Daemon::new()
            .work_dir(work_dir)
            .name(OsStr::new(env!("CARGO_PKG_NAME")))
            .start()?;
        info!(
            target: PROCESS_TARGET,
            pid = std::process::id(),
            work_dir = %work_dir.display(),
            "detached into background"
        );
        Ok(())
    }
}
