//! Errors raised while discovering or invoking file processors.
//!
//! I/O errors are wrapped in `Arc` so the enum stays `Send + Sync` and small
//! enough for the `result_large_err` lint.

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

use crate::operation::Operation;

/// Errors arising from plugin discovery and invocation.
#[derive(Debug, Error)]
pub enum PluginError {
    /// The plugin directory is missing or could not be listed.
    #[error("plugin directory '{}' is unreadable: {source}", path.display())]
    Directory {
        /// Directory that was scanned.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: Arc<std::io::Error>,
    },

    /// A manifest file could not be read.
    #[error("failed to read plugin manifest '{}': {source}", path.display())]
    ManifestRead {
        /// Manifest file path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: Arc<std::io::Error>,
    },

    /// A manifest file did not contain a valid manifest document.
    #[error("failed to parse plugin manifest '{}': {source}", path.display())]
    ManifestParse {
        /// Manifest file path.
        path: PathBuf,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// A plugin manifest failed validation.
    #[error("manifest error: {message}")]
    Manifest {
        /// Description of the validation failure.
        message: String,
    },

    /// The plugin process could not be spawned.
    #[error("plugin '{name}' failed to start: {message}")]
    SpawnFailed {
        /// Plugin name.
        name: String,
        /// Human-readable failure description.
        message: String,
        /// Optional underlying I/O error.
        #[source]
        source: Option<Arc<std::io::Error>>,
    },

    /// The plugin did not complete within its timeout.
    #[error("plugin '{name}' timed out after {timeout_secs}s")]
    Timeout {
        /// Plugin name.
        name: String,
        /// Configured timeout in seconds.
        timeout_secs: u64,
    },

    /// The plugin exited with a non-zero status code.
    #[error("plugin '{name}' exited with non-zero status {status}")]
    NonZeroExit {
        /// Plugin name.
        name: String,
        /// Process exit status, or `-1` when terminated by a signal.
        status: i32,
    },

    /// The request could not be serialised to JSON.
    #[error("failed to serialise plugin request: {0}")]
    SerializeRequest(#[source] serde_json::Error),

    /// The response could not be deserialised from JSON.
    #[error("failed to deserialise plugin response: {message}")]
    DeserializeResponse {
        /// Human-readable description of the parse failure.
        message: String,
        /// Optional underlying JSON error.
        #[source]
        source: Option<serde_json::Error>,
    },

    /// The plugin produced output that does not follow the protocol.
    #[error("plugin '{name}' wrote invalid output: {message}")]
    InvalidOutput {
        /// Plugin name.
        name: String,
        /// Description of the protocol violation.
        message: String,
    },

    /// An I/O error occurred while talking to the plugin process.
    #[error("I/O error communicating with plugin '{name}': {source}")]
    Io {
        /// Plugin name.
        name: String,
        /// Underlying I/O error.
        #[source]
        source: Arc<std::io::Error>,
    },

    /// The plugin ran to completion but reported that the operation failed.
    #[error("plugin '{name}' reported failure for {operation}: {message}")]
    Reported {
        /// Plugin name.
        name: String,
        /// Operation that failed.
        operation: Operation,
        /// Message supplied by the plugin.
        message: String,
    },

    /// A processor panicked while running an operation.
    #[error("plugin '{name}' panicked during {operation}: {message}")]
    Panicked {
        /// Plugin name.
        name: String,
        /// Operation that was running.
        operation: Operation,
        /// Panic payload, when it was a string.
        message: String,
    },

    /// An in-process processor failed.
    #[error("processor failed: {message}")]
    Failed {
        /// Description of the failure.
        message: String,
    },
}

impl PluginError {
    /// Builds an in-process failure from any displayable message.
    #[must_use]
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
        }
    }
}
