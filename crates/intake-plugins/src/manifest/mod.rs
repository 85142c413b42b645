//! Plugin manifests describing how to launch an external file processor.
//!
//! A manifest is a small JSON document placed in the plugin directory. It
//! names the plugin, records its version, and points at the executable that
//! speaks the JSONL protocol. Relative executable paths are resolved against
//! the directory the manifest was read from.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::PluginError;

/// Default timeout in seconds for a single plugin invocation.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Declarative description of an external file processor.
///
/// # Example
///
/// ```
/// use intake_plugins::PluginManifest;
/// use std::path::PathBuf;
///
/// let manifest = PluginManifest::new("rates", "1.0.0", PathBuf::from("/usr/bin/rates"));
/// assert_eq!(manifest.name(), "rates");
/// assert_eq!(manifest.timeout_secs(), 30);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginManifest {
    name: String,
    version: String,
    executable: PathBuf,
    #[serde(default)]
    args: Vec<String>,
    #[serde(default = "default_timeout_secs")]
    timeout_secs: u64,
}

const fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl PluginManifest {
    /// Creates a manifest with the default timeout and no extra arguments.
    #[must_use]
    pub fn new(name: impl Into<String>, version: impl Into<String>, executable: PathBuf) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            executable,
            args: Vec::new(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    /// Reads and validates a manifest file.
    ///
    /// A relative `executable` is joined onto the manifest's parent directory.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::ManifestRead`] when the file cannot be read,
    /// [`PluginError::ManifestParse`] when it is not a manifest document, and
    /// [`PluginError::Manifest`] when validation fails.
    pub fn load(path: &Path) -> Result<Self, PluginError> {
        let contents = fs::read_to_string(path).map_err(|source| PluginError::ManifestRead {
            path: path.to_path_buf(),
            source: Arc::new(source),
        })?;
        let parsed: Self =
            serde_json::from_str(&contents).map_err(|source| PluginError::ManifestParse {
                path: path.to_path_buf(),
                source,
            })?;
        let manifest = match path.parent() {
            Some(base) => parsed.resolved_against(base),
            None => parsed,
        };
        manifest.validate()?;
        Ok(manifest)
    }

    /// Appends default arguments to pass to the plugin executable.
    #[must_use]
    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    /// Overrides the default timeout.
    #[must_use]
    pub const fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Joins a relative executable path onto `base`.
    #[must_use]
    pub fn resolved_against(mut self, base: &Path) -> Self {
        if self.executable.is_relative() {
            self.executable = base.join(&self.executable);
        }
        self
    }

    /// Validates the manifest, returning an error if it is malformed.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::Manifest`] if the name is empty, the executable
    /// path is not absolute, or the timeout is zero.
    pub fn validate(&self) -> Result<(), PluginError> {
        if self.name.trim().is_empty() {
            return Err(PluginError::Manifest {
                message: String::from("plugin name must not be empty"),
            });
        }
        if !self.executable.is_absolute() {
            return Err(PluginError::Manifest {
                message: format!(
                    "plugin executable must be an absolute path, got '{}'",
                    self.executable.display()
                ),
            });
        }
        if self.timeout_secs == 0 {
            return Err(PluginError::Manifest {
                message: format!("plugin '{}' must declare a non-zero timeout", self.name),
            });
        }
        Ok(())
    }

    /// Returns the plugin name.
    #[must_use]
    pub const fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Returns the plugin version.
    #[must_use]
    pub const fn version(&self) -> &str {
        self.version.as_str()
    }

    /// Returns the path to the plugin executable.
    #[must_use]
    pub fn executable(&self) -> &Path {
        &self.executable
    }

    /// Returns the default arguments.
    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Returns the timeout in seconds.
    #[must_use]
    pub const fn timeout_secs(&self) -> u64 {
        self.timeout_secs
    }
}
