use camino::Utf8PathBuf;

use crate::logging::LogFormat;

/// Default directory observed for newly created files.
pub const DEFAULT_WATCHED_DIR: &str = "inbox";

/// Default directory receiving dispatched files.
pub const DEFAULT_ARCHIVE_DIR: &str = "archive";

/// Default directory scanned for plugin manifests at startup.
pub const DEFAULT_PLUGIN_DIR: &str = "plugins";

/// Default glob applied to the names of created files.
pub const DEFAULT_FILE_PATTERN: &str = "*.xml";

/// Default bounded wait, in seconds, for the consumer loop on shutdown.
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 10;

/// Default log filter expression used by the binaries.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Default watched directory as an owned path.
#[must_use]
pub fn default_watched_dir() -> Utf8PathBuf {
    Utf8PathBuf::from(DEFAULT_WATCHED_DIR)
}

/// Default archive directory as an owned path.
#[must_use]
pub fn default_archive_dir() -> Utf8PathBuf {
    Utf8PathBuf::from(DEFAULT_ARCHIVE_DIR)
}

/// Default plugin directory as an owned path.
#[must_use]
pub fn default_plugin_dir() -> Utf8PathBuf {
    Utf8PathBuf::from(DEFAULT_PLUGIN_DIR)
}

/// Owned file pattern value used where allocation is required (e.g. serde).
#[must_use]
pub fn default_file_pattern() -> String {
    DEFAULT_FILE_PATTERN.to_owned()
}

/// Owned log filter value used where allocation is required (e.g. serde).
#[must_use]
pub fn default_log_filter() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default shutdown budget in seconds.
#[must_use]
pub const fn default_shutdown_timeout_secs() -> u64 {
    DEFAULT_SHUTDOWN_TIMEOUT_SECS
}

/// Default logging format for the binaries.
#[must_use]
pub const fn default_log_format() -> LogFormat {
    LogFormat::Json
}
