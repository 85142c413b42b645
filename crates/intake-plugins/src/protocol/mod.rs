//! JSONL protocol spoken between the daemon and external processors.
//!
//! The daemon writes one [`PluginRequest`] line to the plugin's stdin and
//! closes it. The plugin writes one [`PluginResponse`] line to stdout and
//! exits with status zero. Stderr is captured for diagnostic logging only.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::operation::Operation;

/// Request naming the operation to run and the file to run it on.
///
/// # Example
///
/// ```
/// use intake_plugins::{Operation, PluginRequest};
/// use std::path::PathBuf;
///
/// let request = PluginRequest::new(Operation::History, PathBuf::from("/inbox/ratehistory.xml"));
/// assert_eq!(request.operation(), Operation::History);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PluginRequest {
    operation: Operation,
    path: PathBuf,
}

impl PluginRequest {
    /// Creates a request for a single file.
    #[must_use]
    pub const fn new(operation: Operation, path: PathBuf) -> Self {
        Self { operation, path }
    }

    /// Returns the requested operation.
    #[must_use]
    pub const fn operation(&self) -> Operation {
        self.operation
    }

    /// Returns the path of the file to process.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Outcome reported by a plugin on stdout.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PluginResponse {
    success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

impl PluginResponse {
    /// Creates a successful response.
    #[must_use]
    pub const fn success() -> Self {
        Self {
            success: true,
            message: None,
        }
    }

    /// Creates a failed response carrying a reason.
    #[must_use]
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
        }
    }

    /// Attaches an informational message.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Returns `true` if the plugin completed the operation.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.success
    }

    /// Returns the optional message.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }
}

#[cfg(test)]
mod tests;
