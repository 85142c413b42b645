//! Test doubles shared by the bootstrap and process suites.

use std::ffi::OsString;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use camino::Utf8PathBuf;
use intake_config::Config;
use ortho_config::{OrthoConfig, OrthoError};
use tempfile::TempDir;

use crate::bootstrap::{BootstrapError, ConfigLoader};
use crate::health::HealthReporter;
use crate::pipeline::{PipelineSettings, StartError, StopReport};

const WAIT_TIMEOUT: Duration = Duration::from_secs(10);
const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Polls `condition` until it holds or the wait budget runs out.
pub fn wait_for(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + WAIT_TIMEOUT;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(POLL_INTERVAL);
    }
    condition()
}

/// Loader that provisions watched, archive, and runtime directories under a
/// temporary root.
#[derive(Clone)]
pub struct TestConfigLoader {
    _root: Arc<TempDir>,
    base: PathBuf,
}

impl TestConfigLoader {
    #[must_use]
    pub fn new() -> Self {
        let root = TempDir::new().expect("failed to create temporary directory");
        let base = fs::canonicalize(root.path()).expect("canonical temporary directory");
        fs::create_dir(base.join("inbox")).expect("create watched directory");
        Self {
            _root: Arc::new(root),
            base,
        }
    }

    pub fn watched_dir(&self) -> PathBuf {
        self.base.join("inbox")
    }

    pub fn archive_dir(&self) -> PathBuf {
        self.base.join("archive")
    }

    pub fn runtime_dir(&self) -> PathBuf {
        self.base.join("run")
    }

    fn utf8(path: PathBuf) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(path).expect("temporary path was not valid UTF-8")
    }
}

impl ConfigLoader for TestConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Ok(Config {
            watched_dir: Self::utf8(self.watched_dir()),
            archive_dir: Self::utf8(self.archive_dir()),
            plugin_dir: Self::utf8(self.base.join("plugins")),
            runtime_dir: Some(Self::utf8(self.runtime_dir())),
            ..Config::default()
        })
    }
}

/// Loader that intentionally fails by passing an invalid CLI value.
pub struct FailingConfigLoader;

impl ConfigLoader for FailingConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        let args = vec![
            OsString::from("intaked"),
            OsString::from("--shutdown-timeout-secs"),
            OsString::from("soon"),
        ];
        Config::load_from_iter(args)
    }
}

/// Structured health events tracked during tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthEvent {
    BootstrapStarting,
    BootstrapSucceeded,
    BootstrapFailed(String),
    PipelineStarting,
    PipelineReady,
    PipelineFailed(String),
    PipelineStopped { abandoned: usize },
}

/// Records health events for assertions.
#[derive(Debug, Default)]
pub struct RecordingHealthReporter {
    events: Mutex<Vec<HealthEvent>>,
}

impl RecordingHealthReporter {
    #[must_use]
    pub fn events(&self) -> Vec<HealthEvent> {
        self.events
            .lock()
            .expect("health reporter mutex poisoned")
            .clone()
    }

    fn record(&self, event: HealthEvent) {
        self.events
            .lock()
            .expect("health reporter mutex poisoned")
            .push(event);
    }
}

impl HealthReporter for RecordingHealthReporter {
    fn bootstrap_starting(&self) {
        self.record(HealthEvent::BootstrapStarting);
    }

    fn bootstrap_succeeded(&self, _config: &Config) {
        self.record(HealthEvent::BootstrapSucceeded);
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        self.record(HealthEvent::BootstrapFailed(error.to_string()));
    }

    fn pipeline_starting(&self, _settings: &PipelineSettings) {
        self.record(HealthEvent::PipelineStarting);
    }

    fn pipeline_ready(&self, _settings: &PipelineSettings) {
        self.record(HealthEvent::PipelineReady);
    }

    fn pipeline_failed(&self, error: &StartError) {
        self.record(HealthEvent::PipelineFailed(error.to_string()));
    }

    fn pipeline_stopped(&self, report: &StopReport) {
        self.record(HealthEvent::PipelineStopped {
            abandoned: report.abandoned.len(),
        });
    }
}
