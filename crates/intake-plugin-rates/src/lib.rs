//! Reference rates processor speaking the intake plugin protocol.
//!
//! The plugin reads exactly one JSONL request from stdin, runs the named
//! operation against the file, and writes one JSONL response to stdout.
//! Processing is simulated: the adapter checks the file is present, reports
//! progress on stderr, and waits for a configurable delay
//! (`INTAKE_RATES_DELAY_MS`, default one second) before succeeding.

#[cfg(test)]
mod tests;

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use intake_plugins::{Operation, PluginRequest, PluginResponse};
use thiserror::Error;

/// Environment variable overriding the simulated processing delay.
pub const DELAY_ENV_VAR: &str = "INTAKE_RATES_DELAY_MS";

/// Simulated processing delay when none is configured.
pub const DEFAULT_DELAY: Duration = Duration::from_millis(1000);

/// Processing backend abstraction used to keep behaviour deterministic in tests.
pub trait RatesAdapter {
    /// Runs `operation` against the file at `path`, returning a summary.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be processed.
    fn process(&self, operation: Operation, path: &Path) -> Result<String, RatesAdapterError>;
}

/// Adapter that stands in for the upstream rates service.
#[derive(Debug, Clone, Copy)]
pub struct SimulatedRatesAdapter {
    delay: Duration,
}

impl SimulatedRatesAdapter {
    /// Creates an adapter that waits `delay` per operation.
    #[must_use]
    pub const fn new(delay: Duration) -> Self {
        Self { delay }
    }

    /// Creates an adapter whose delay comes from [`DELAY_ENV_VAR`].
    ///
    /// # Errors
    ///
    /// Returns [`RatesAdapterError::InvalidDelay`] when the variable is set but
    /// is not a whole number of milliseconds.
    pub fn from_env() -> Result<Self, RatesAdapterError> {
        let configured = std::env::var(DELAY_ENV_VAR).ok();
        parse_delay(configured.as_deref()).map(Self::new)
    }

    /// Returns the configured delay.
    #[must_use]
    pub const fn delay(&self) -> Duration {
        self.delay
    }
}

impl RatesAdapter for SimulatedRatesAdapter {
    fn process(&self, operation: Operation, path: &Path) -> Result<String, RatesAdapterError> {
        if !path.is_file() {
            return Err(RatesAdapterError::MissingFile {
                path: path.to_path_buf(),
            });
        }
        progress(&format!("starting {operation} for {}", path.display()));
        thread::sleep(self.delay);
        progress(&format!("finished {operation} for {}", path.display()));
        Ok(format!("{operation} completed for {}", path.display()))
    }
}

/// Parses a millisecond delay, falling back to [`DEFAULT_DELAY`].
///
/// # Errors
///
/// Returns [`RatesAdapterError::InvalidDelay`] for non-numeric input.
pub fn parse_delay(value: Option<&str>) -> Result<Duration, RatesAdapterError> {
    let Some(raw) = value.map(str::trim).filter(|text| !text.is_empty()) else {
        return Ok(DEFAULT_DELAY);
    };
    raw.parse::<u64>()
        .map(Duration::from_millis)
        .map_err(|source| RatesAdapterError::InvalidDelay {
            value: raw.to_owned(),
            source,
        })
}

fn progress(message: &str) {
    drop(writeln!(io::stderr().lock(), "{message}"));
}

/// Errors raised while dispatching plugin requests.
#[derive(Debug, Error)]
pub enum PluginDispatchError {
    /// Writing the plugin response to stdout failed.
    #[error("failed to write plugin response: {source}")]
    Write {
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// Serializing the response payload failed.
    #[error("failed to serialize plugin response: {source}")]
    Serialize {
        /// Underlying serialization error.
        #[source]
        source: serde_json::Error,
    },
    /// The adapter could not be configured.
    #[error(transparent)]
    Adapter(#[from] RatesAdapterError),
}

/// Errors raised by rates adapter implementations.
#[derive(Debug, Error)]
pub enum RatesAdapterError {
    /// The requested file does not exist.
    #[error("file '{}' does not exist", path.display())]
    MissingFile {
        /// Path named in the request.
        path: PathBuf,
    },
    /// The delay override is not a whole number of milliseconds.
    #[error("{DELAY_ENV_VAR} must be a whole number of milliseconds, got '{value}'")]
    InvalidDelay {
        /// Raw configured value.
        value: String,
        /// Parse failure.
        #[source]
        source: std::num::ParseIntError,
    },
}

/// Executes one plugin request from `stdin` and writes one response to `stdout`.
///
/// # Errors
///
/// Returns an error if the response cannot be serialized or written.
pub fn run_with_adapter<R: RatesAdapter>(
    stdin: &mut impl BufRead,
    stdout: &mut impl Write,
    adapter: &R,
) -> Result<(), PluginDispatchError> {
    let response = match read_request(stdin).and_then(|request| execute_request(adapter, &request))
    {
        Ok(resp) => resp,
        Err(message) => PluginResponse::failure(message),
    };

    let mut payload = serde_json::to_string(&response)
        .map_err(|source| PluginDispatchError::Serialize { source })?;
    payload.push('\n');
    stdout
        .write_all(payload.as_bytes())
        .and_then(|()| stdout.flush())
        .map_err(|source| PluginDispatchError::Write { source })
}

/// Executes one plugin request using the simulated adapter.
///
/// # Errors
///
/// Returns an error if the delay override is invalid or the response cannot
/// be written.
pub fn run(stdin: &mut impl BufRead, stdout: &mut impl Write) -> Result<(), PluginDispatchError> {
    let adapter = SimulatedRatesAdapter::from_env()?;
    run_with_adapter(stdin, stdout, &adapter)
}

fn read_request(stdin: &mut impl BufRead) -> Result<PluginRequest, String> {
    let mut line = String::new();
    let bytes_read = stdin
        .read_line(&mut line)
        .map_err(|error| format!("failed to read request: {error}"))?;

    if bytes_read == 0 {
        return Err(String::from("plugin request was empty"));
    }

    serde_json::from_str(line.trim())
        .map_err(|error| format!("invalid plugin request JSON: {error}"))
}

fn execute_request<R: RatesAdapter>(
    adapter: &R,
    request: &PluginRequest,
) -> Result<PluginResponse, String> {
    adapter
        .process(request.operation(), request.path())
        .map(|summary| PluginResponse::success().with_message(summary))
        .map_err(|error| error.to_string())
}
