//! Metrics configuration
//!
//! Built once through [`ConfigBuilder`] and immutable afterwards.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use opentelemetry_sdk::metrics::exporter::PushMetricExporter;

use crate::error::MetricsError;
use crate::export::{MetricExporter, PushExporter};
use crate::flush::DEFAULT_FLUSH_DEADLINE;

/// Validated metrics configuration.
#[derive(Clone)]
pub struct Config {
    service_name: String,
    exporters: Vec<Arc<dyn MetricExporter>>,
    stdout_debug: bool,
    flush_deadline: Duration,
    consent_dir: Option<PathBuf>,
    interactive: Option<bool>,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("service_name", &self.service_name)
            .field(
                "exporters",
                &self.exporters.iter().map(|e| e.name()).collect::<Vec<_>>(),
            )
            .field("stdout_debug", &self.stdout_debug)
            .field("flush_deadline", &self.flush_deadline)
            .field("consent_dir", &self.consent_dir)
            .field("interactive", &self.interactive)
            .finish()
    }
}

impl Config {
    /// Start a builder whose service name defaults to `root_name`.
    pub fn builder(root_name: impl Into<String>) -> ConfigBuilder {
        ConfigBuilder::new(root_name)
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    pub fn exporters(&self) -> &[Arc<dyn MetricExporter>] {
        &self.exporters
    }

    /// Whether snapshots are also printed to stdout.
    pub fn stdout_debug(&self) -> bool {
        self.stdout_debug
    }

    /// Upper bound on the final drain-and-release.
    pub fn flush_deadline(&self) -> Duration {
        self.flush_deadline
    }

    /// Directory holding the consent record, if not the user config dir.
    pub fn consent_dir(&self) -> Option<&Path> {
        self.consent_dir.as_deref()
    }

    /// Forced interactivity; `None` means detect from stdin.
    pub fn interactive(&self) -> Option<bool> {
        self.interactive
    }
}

/// Builder for [`Config`].
pub struct ConfigBuilder {
    service_name: String,
    exporters: Vec<Arc<dyn MetricExporter>>,
    stdout_debug: bool,
    flush_deadline: Duration,
    consent_dir: Option<PathBuf>,
    interactive: Option<bool>,
}

impl ConfigBuilder {
    pub fn new(root_name: impl Into<String>) -> Self {
        Self {
            service_name: root_name.into(),
            exporters: Vec::new(),
            stdout_debug: false,
            flush_deadline: DEFAULT_FLUSH_DEADLINE,
            consent_dir: None,
            interactive: None,
        }
    }

    pub fn service_name(mut self, name: impl Into<String>) -> Self {
        self.service_name = name.into();
        self
    }

    /// Add an exporter. Exporters run in the order they are added.
    pub fn exporter(mut self, exporter: impl MetricExporter + 'static) -> Self {
        self.exporters.push(Arc::new(exporter));
        self
    }

    /// Add an OpenTelemetry push exporter under `name`.
    pub fn push_exporter<E: PushMetricExporter>(self, name: impl Into<String>, exporter: E) -> Self {
        self.exporter(PushExporter::new(name, exporter))
    }

    pub fn shared_exporter(mut self, exporter: Arc<dyn MetricExporter>) -> Self {
        self.exporters.push(exporter);
        self
    }

    pub fn stdout_debug(mut self, enabled: bool) -> Self {
        self.stdout_debug = enabled;
        self
    }

    pub fn flush_deadline(mut self, deadline: Duration) -> Self {
        self.flush_deadline = deadline;
        self
    }

    pub fn consent_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.consent_dir = Some(dir.into());
        self
    }

    pub fn interactive(mut self, interactive: bool) -> Self {
        self.interactive = Some(interactive);
        self
    }

    pub fn build(self) -> Result<Config, MetricsError> {
        if self.service_name.trim().is_empty() {
            return Err(MetricsError::Configuration(
                "service name must not be empty".into(),
            ));
        }
        if self.flush_deadline.is_zero() {
            return Err(MetricsError::Configuration(
                "flush deadline must be greater than zero".into(),
            ));
        }

        Ok(Config {
            service_name: self.service_name,
            exporters: self.exporters,
            stdout_debug: self.stdout_debug,
            flush_deadline: self.flush_deadline,
            consent_dir: self.consent_dir,
            interactive: self.interactive,
        })
    }
}
