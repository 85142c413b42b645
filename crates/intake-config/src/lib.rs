//! Shared configuration for the intake daemon and its tooling.
//!
//! Configuration is layered by `ortho_config`: built-in defaults, then an
//! optional configuration file (`--config-path` or `INTAKE_CONFIG_PATH`), then
//! `INTAKE_*` environment variables, then command-line flags. The resolved
//! [`Config`] is treated as immutable for the lifetime of the process.

mod defaults;
mod logging;
mod runtime;

use std::path::Path;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};

pub use defaults::{
    DEFAULT_ARCHIVE_DIR, DEFAULT_FILE_PATTERN, DEFAULT_LOG_FILTER, DEFAULT_PLUGIN_DIR,
    DEFAULT_SHUTDOWN_TIMEOUT_SECS, DEFAULT_WATCHED_DIR, default_archive_dir,
    default_file_pattern, default_log_filter, default_log_format, default_plugin_dir,
    default_shutdown_timeout_secs, default_watched_dir,
};
pub use logging::{LogFormat, LogFormatParseError};
pub use runtime::{RuntimePaths, RuntimePathsError};

/// Resolved daemon configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "INTAKE")]
pub struct Config {
    /// Directory observed for newly created files.
    #[ortho_config(default = default_watched_dir())]
    pub watched_dir: Utf8PathBuf,
    /// Directory receiving files once they have been dispatched.
    #[ortho_config(default = default_archive_dir())]
    pub archive_dir: Utf8PathBuf,
    /// Directory scanned for plugin manifests at startup.
    #[ortho_config(default = default_plugin_dir())]
    pub plugin_dir: Utf8PathBuf,
    /// Glob applied to the names of created files.
    #[ortho_config(default = default_file_pattern())]
    pub file_pattern: String,
    /// Directory holding the lock, pid, and health files.
    #[serde(default)]
    pub runtime_dir: Option<Utf8PathBuf>,
    /// Bounded wait, in seconds, for the consumer loop during shutdown.
    #[ortho_config(default = default_shutdown_timeout_secs())]
    pub shutdown_timeout_secs: u64,
    /// `tracing` filter expression.
    #[ortho_config(default = default_log_filter())]
    pub log_filter: String,
    /// Output encoding for log lines.
    #[ortho_config(default = default_log_format())]
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            watched_dir: default_watched_dir(),
            archive_dir: default_archive_dir(),
            plugin_dir: default_plugin_dir(),
            file_pattern: default_file_pattern(),
            runtime_dir: None,
            shutdown_timeout_secs: default_shutdown_timeout_secs(),
            log_filter: default_log_filter(),
            log_format: default_log_format(),
        }
    }
}

impl Config {
    /// Directory observed for newly created files.
    #[must_use]
    pub fn watched_dir(&self) -> &Path {
        self.watched_dir.as_std_path()
    }

    /// Directory receiving dispatched files.
    #[must_use]
    pub fn archive_dir(&self) -> &Path {
        self.archive_dir.as_std_path()
    }

    /// Directory scanned for plugin manifests.
    #[must_use]
    pub fn plugin_dir(&self) -> &Path {
        self.plugin_dir.as_std_path()
    }

    /// Glob applied to created file names.
    #[must_use]
    pub fn file_pattern(&self) -> &str {
        self.file_pattern.as_str()
    }

    /// Shutdown budget for the consumer loop.
    #[must_use]
    pub const fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }

    /// `tracing` filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        self.log_filter.as_str()
    }

    /// Output encoding for log lines.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Resolves relative directories against `base`.
    ///
    /// The daemon changes its working directory when it detaches, so paths
    /// are anchored to the launch directory first.
    #[must_use]
    pub fn anchored_at(mut self, base: &Utf8Path) -> Self {
        for dir in [
            &mut self.watched_dir,
            &mut self.archive_dir,
            &mut self.plugin_dir,
        ] {
            if dir.is_relative() {
                *dir = base.join(&*dir);
            }
        }
        if let Some(dir) = self.runtime_dir.as_mut()
            && dir.is_relative()
        {
            *dir = base.join(&*dir);
        }
        self
    }
}
