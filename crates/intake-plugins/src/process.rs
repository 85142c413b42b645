//! Process-based plugin execution.
//!
//! [`ProcessExecutor`] spawns the plugin executable named by a manifest,
//! writes the request to stdin as a single JSONL line, reads one response line
//! from stdout, and enforces the manifest timeout across the whole exchange.
//! [`ProcessPlugin`] adapts a manifest and an executor into a
//! [`FileProcessor`] the dispatcher can call.

use std::io::{BufRead, BufReader, Read, Write};
use std::path::Path;
use std::process::{Child, ChildStderr, ChildStdout, Command, Stdio};
use std::sync::{Arc, mpsc};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::capability::FileProcessor;
use crate::error::PluginError;
use crate::manifest::PluginManifest;
use crate::operation::Operation;
use crate::protocol::{PluginRequest, PluginResponse};

/// Tracing target for plugin process operations.
const PLUGIN_TARGET: &str = "intake_plugins::process";

/// Poll interval while waiting for the plugin to exit.
const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Trait abstracting plugin process execution for testability.
///
/// The production implementation is [`ProcessExecutor`]. Tests substitute
/// doubles that return canned responses without spawning processes.
pub trait PluginExecutor: Send + Sync {
    /// Executes the plugin described by the manifest with the given request.
    ///
    /// # Errors
    ///
    /// Returns a [`PluginError`] if the plugin cannot be spawned, times out,
    /// exits with a non-zero status, or produces invalid output.
    fn execute(
        &self,
        manifest: &PluginManifest,
        request: &PluginRequest,
    ) -> Result<PluginResponse, PluginError>;
}

/// Executes plugins by spawning child processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessExecutor;

impl PluginExecutor for ProcessExecutor {
    fn execute(
        &self,
        manifest: &PluginManifest,
        request: &PluginRequest,
    ) -> Result<PluginResponse, PluginError> {
        run_process(manifest, request)
    }
}

/// A manifest-backed plugin usable as a [`FileProcessor`].
pub struct ProcessPlugin {
    manifest: PluginManifest,
    executor: Arc<dyn PluginExecutor>,
}

impl ProcessPlugin {
    /// Binds a manifest to the executor that will run it.
    #[must_use]
    pub fn new(manifest: PluginManifest, executor: Arc<dyn PluginExecutor>) -> Self {
        Self { manifest, executor }
    }

    /// Returns the manifest this plugin was built from.
    #[must_use]
    pub const fn manifest(&self) -> &PluginManifest {
        &self.manifest
    }

    fn run(&self, operation: Operation, path: &Path) -> Result<(), PluginError> {
        let request = PluginRequest::new(operation, path.to_path_buf());
        let response = self.executor.execute(&self.manifest, &request)?;
        if !response.is_success() {
            return Err(PluginError::Reported {
                name: self.manifest.name().to_owned(),
                operation,
                message: response
                    .message()
                    .unwrap_or("plugin gave no reason")
                    .to_owned(),
            });
        }
        if let Some(message) = response.message() {
            debug!(
                target: PLUGIN_TARGET,
                plugin = self.manifest.name(),
                %operation,
                message,
                "plugin reported success"
            );
        }
        Ok(())
    }
}

impl FileProcessor for ProcessPlugin {
    fn history(&self, path: &Path) -> Result<(), PluginError> {
        self.run(Operation::History, path)
    }

    fn security(&self, path: &Path) -> Result<(), PluginError> {
        self.run(Operation::Security, path)
    }

    fn complex_analysis(&self, path: &Path) -> Result<(), PluginError> {
        self.run(Operation::ComplexAnalysis, path)
    }
}

impl std::fmt::Debug for ProcessPlugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessPlugin")
            .field("manifest", &self.manifest)
            .finish_non_exhaustive()
    }
}

/// Spawns the plugin process, writes the request, and reads the response.
fn run_process(
    manifest: &PluginManifest,
    request: &PluginRequest,
) -> Result<PluginResponse, PluginError> {
    let name = manifest.name();
    let timeout_secs = manifest.timeout_secs();
    let deadline = Instant::now() + Duration::from_secs(timeout_secs);

    debug!(
        target: PLUGIN_TARGET,
        plugin = name,
        executable = %manifest.executable().display(),
        operation = %request.operation(),
        "spawning plugin process"
    );

    let mut child = Command::new(manifest.executable())
        .args(manifest.args())
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|err| PluginError::SpawnFailed {
            name: name.to_owned(),
            message: err.to_string(),
            source: Some(Arc::new(err)),
        })?;

    let stdin = child.stdin.take().ok_or_else(|| PluginError::SpawnFailed {
        name: name.to_owned(),
        message: String::from("failed to capture stdin"),
        source: None,
    })?;
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| PluginError::SpawnFailed {
            name: name.to_owned(),
            message: String::from("failed to capture stdout"),
            source: None,
        })?;
    let stderr = child.stderr.take().map(drain_stderr);

    write_request(name, stdin, request).inspect_err(|_| abandon(&mut child))?;
    let line = read_response(name, stdout, deadline, timeout_secs)
        .inspect_err(|_| abandon(&mut child))?;
    wait_for_exit(name, &mut child, deadline, timeout_secs)?;
    log_stderr(name, stderr);
    parse_response(name, &line)
}

/// Writes the serialised request to the plugin's stdin and closes it.
fn write_request(
    name: &str,
    mut stdin: impl Write,
    request: &PluginRequest,
) -> Result<(), PluginError> {
    let mut json = serde_json::to_string(request).map_err(PluginError::SerializeRequest)?;
    json.push('\n');

    stdin
        .write_all(json.as_bytes())
        .and_then(|()| stdin.flush())
        .map_err(|err| PluginError::Io {
            name: name.to_owned(),
            source: Arc::new(err),
        })
}

/// Reads a single JSONL line from stdout, giving up at `deadline`.
fn read_response(
    name: &str,
    stdout: ChildStdout,
    deadline: Instant,
    timeout_secs: u64,
) -> Result<String, PluginError> {
    let started = Instant::now();
    let (sender, receiver) = mpsc::channel();
    thread::spawn(move || {
        let mut line = String::new();
        let result = BufReader::new(stdout).read_line(&mut line).map(|_| line);
        drop(sender.send(result));
    });

    let remaining = deadline.saturating_duration_since(Instant::now());
    match receiver.recv_timeout(remaining) {
        Ok(Ok(line)) if line.trim().is_empty() => Err(PluginError::InvalidOutput {
            name: name.to_owned(),
            message: String::from("plugin produced no output on stdout"),
        }),
        Ok(Ok(line)) => {
            debug!(
                target: PLUGIN_TARGET,
                plugin = name,
                bytes_read = line.len(),
                elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
                "read response from plugin stdout"
            );
            Ok(line)
        }
        Ok(Err(err)) => Err(PluginError::Io {
            name: name.to_owned(),
            source: Arc::new(err),
        }),
        Err(mpsc::RecvTimeoutError::Timeout) => {
            warn!(
                target: PLUGIN_TARGET,
                plugin = name,
                timeout_secs,
                "plugin timed out, killing process"
            );
            Err(PluginError::Timeout {
                name: name.to_owned(),
                timeout_secs,
            })
        }
        Err(mpsc::RecvTimeoutError::Disconnected) => Err(PluginError::InvalidOutput {
            name: name.to_owned(),
            message: String::from("stdout reader stopped before a line was read"),
        }),
    }
}

/// Waits for the child process to exit, enforcing the deadline.
fn wait_for_exit(
    name: &str,
    child: &mut Child,
    deadline: Instant,
    timeout_secs: u64,
) -> Result<(), PluginError> {
    loop {
        match child.try_wait() {
            Ok(Some(status)) => {
                debug!(
                    target: PLUGIN_TARGET,
                    plugin = name,
                    ?status,
                    "plugin process exited"
                );
                if status.success() {
                    return Ok(());
                }
                return Err(PluginError::NonZeroExit {
                    name: name.to_owned(),
                    status: status.code().unwrap_or(-1),
                });
            }
            Ok(None) => {
                if Instant::now() >= deadline {
                    warn!(
                        target: PLUGIN_TARGET,
                        plugin = name,
                        timeout_secs,
                        "plugin did not exit in time, killing process"
                    );
                    abandon(child);
                    return Err(PluginError::Timeout {
                        name: name.to_owned(),
                        timeout_secs,
                    });
                }
                thread::sleep(EXIT_POLL_INTERVAL);
            }
            Err(err) => {
                return Err(PluginError::Io {
                    name: name.to_owned(),
                    source: Arc::new(err),
                });
            }
        }
    }
}

/// Kills and reaps a child whose exchange has already failed.
fn abandon(child: &mut Child) {
    drop(child.kill());
    drop(child.wait());
}

/// Drains stderr on a helper thread so a chatty plugin cannot fill the pipe.
fn drain_stderr(stderr: ChildStderr) -> JoinHandle<String> {
    thread::spawn(move || {
        let mut buffer = String::new();
        drop(BufReader::new(stderr).read_to_string(&mut buffer));
        buffer
    })
}

fn log_stderr(name: &str, handle: Option<JoinHandle<String>>) {
    let Some(buffer) = handle.and_then(|reader| reader.join().ok()) else {
        return;
    };
    if !buffer.trim().is_empty() {
        debug!(
            target: PLUGIN_TARGET,
            plugin = name,
            stderr = %buffer.trim(),
            "plugin stderr output"
        );
    }
}

/// Parses a JSONL response line into a [`PluginResponse`].
fn parse_response(name: &str, line: &str) -> Result<PluginResponse, PluginError> {
    serde_json::from_str(line.trim()).map_err(|err| PluginError::DeserializeResponse {
        message: format!("plugin '{name}' produced invalid JSON: {err}"),
        source: Some(err),
    })
}
