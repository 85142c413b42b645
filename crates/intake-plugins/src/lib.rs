//! File processor plugins for the intake daemon.
//!
//! A plugin is anything implementing [`FileProcessor`]: one blocking method
//! per [`Operation`] the dispatcher may request. Production plugins are
//! external executables described by JSON [`PluginManifest`] files and run
//! through a [`PluginExecutor`], which speaks a single-line JSONL protocol
//! over standard I/O. The [`PluginRegistry`] collects processors in a stable
//! order and hands out named [`ProcessorHandle`]s.
//!
//! # Example
//!
//! ```rust,no_run
//! use intake_plugins::PluginRegistry;
//! use std::path::Path;
//!
//! let registry = PluginRegistry::discover(Path::new("/etc/intake/plugins"))
//!     .expect("plugins load");
//! for handle in registry.handles() {
//!     println!("loaded {}", handle.name());
//! }
//! ```

pub mod capability;
pub mod error;
pub mod manifest;
pub mod operation;
pub mod process;
pub mod protocol;
pub mod registry;

#[cfg(test)]
mod tests;

pub use self::capability::{FileProcessor, ProcessorHandle};
pub use self::error::PluginError;
pub use self::manifest::PluginManifest;
pub use self::operation::Operation;
pub use self::process::{PluginExecutor, ProcessExecutor, ProcessPlugin};
pub use self::protocol::{PluginRequest, PluginResponse};
pub use self::registry::PluginRegistry;
