//! Structured health reporting for daemon lifecycle events.

use std::sync::Arc;

use intake_config::Config;

use crate::bootstrap::BootstrapError;
use crate::pipeline::{PipelineSettings, StartError, StopReport};

const HEALTH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::health");

/// Observer trait used to surface lifecycle events to telemetry sinks.
pub trait HealthReporter: Send + Sync {
    /// Invoked before configuration loading begins.
    fn bootstrap_starting(&self);

    /// Invoked after bootstrap completes successfully.
    fn bootstrap_succeeded(&self, config: &Config);

    /// Invoked when bootstrap fails.
    fn bootstrap_failed(&self, error: &BootstrapError);

    /// Invoked before the pipeline is started.
    fn pipeline_starting(&self, settings: &PipelineSettings);

    /// Invoked once files are being watched.
    fn pipeline_ready(&self, settings: &PipelineSettings);

    /// Invoked when the pipeline fails to start.
    fn pipeline_failed(&self, error: &StartError);

    /// Invoked after the pipeline has stopped.
    fn pipeline_stopped(&self, report: &StopReport);
}

impl<T> HealthReporter for Arc<T>
where
    T: HealthReporter,
{
    fn bootstrap_starting(&self) {
        (**self).bootstrap_starting();
    }

    fn bootstrap_succeeded(&self, config: &Config) {
        (**self).bootstrap_succeeded(config);
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        (**self).bootstrap_failed(error);
    }

    fn pipeline_starting(&self, settings: &PipelineSettings) {
        (**self).pipeline_starting(settings);
    }

    fn pipeline_ready(&self, settings: &PipelineSettings) {
        (**self).pipeline_ready(settings);
    }

    fn pipeline_failed(&self, error: &StartError) {
        (**self).pipeline_failed(error);
    }

    fn pipeline_stopped(&self, report: &StopReport) {
        (**self).pipeline_stopped(report);
    }
}

/// Default reporter that records lifecycle events using `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuredHealthReporter;

impl StructuredHealthReporter {
    /// Builds a new reporter.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl HealthReporter for StructuredHealthReporter {
    fn bootstrap_starting(&self) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "bootstrap_starting",
            "starting daemon bootstrap"
        );
    }

    fn bootstrap_succeeded(&self, config: &Config) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "bootstrap_succeeded",
            watched_dir = %config.watched_dir().display(),
            archive_dir = %config.archive_dir().display(),
            plugin_dir = %config.plugin_dir().display(),
            log_filter = %config.log_filter(),
            log_format = %config.log_format(),
            "daemon bootstrap completed"
        );
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        tracing::error!(
            target: HEALTH_TARGET,
            event = "bootstrap_failed",
            error = %error,
            "daemon bootstrap failed"
        );
    }

    fn pipeline_starting(&self, settings: &PipelineSettings) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "pipeline_starting",
            plugin_dir = %settings.plugin_dir().display(),
            "starting ingestion pipeline"
        );
    }

    fn pipeline_ready(&self, settings: &PipelineSettings) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "pipeline_ready",
            watched_dir = %settings.watched_dir().display(),
            pattern = settings.file_pattern(),
            "ingestion pipeline ready"
        );
    }

    fn pipeline_failed(&self, error: &StartError) {
        tracing::error!(
            target: HEALTH_TARGET,
            event = "pipeline_failed",
            error = %error,
            "ingestion pipeline failed to start"
        );
    }

    fn pipeline_stopped(&self, report: &StopReport) {
        let summary = report.summary.unwrap_or_default();
        tracing::info!(
            target: HEALTH_TARGET,
            event = "pipeline_stopped",
            dispatched = summary.dispatched,
            archived = summary.archived,
            unrecognized = summary.unrecognized,
            failed = summary.failed,
            abandoned = report.abandoned.len(),
            timed_out = report.timed_out,
            "ingestion pipeline stopped"
        );
    }
}
