//! Process supervision: launch mode, singleton guard, and signal handling.
//!
//! The supervisor acquires the runtime lock, optionally detaches into the
//! background, records the pid and health snapshots, bootstraps the
//! pipeline, and blocks until a termination signal arrives.

mod daemonizer;
mod errors;
mod files;
mod guard;
mod launch;
mod shutdown;

pub use daemonizer::{Daemonizer, SystemDaemonizer};
pub use errors::{Artefact, LaunchError};
pub use launch::{LaunchMode, run_daemon};
pub use shutdown::{ShutdownCause, ShutdownError, ShutdownSignal, SystemShutdownSignal};

pub(crate) const PROCESS_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::process");
pub(crate) const FOREGROUND_ENV_VAR: &str = "INTAKE_FOREGROUND";
