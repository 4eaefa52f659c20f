//! Exporters that receive the final snapshot.
//!
//! Any OpenTelemetry [`PushMetricExporter`] can be registered through
//! [`PushExporter`], which gives it a name for logs and aggregated errors.
//! [`MetricExporter`] is the object-safe seam the provider iterates over.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use opentelemetry_sdk::metrics::data::ResourceMetrics;
use opentelemetry_sdk::metrics::exporter::PushMetricExporter;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExporterError {
    #[error("{0}")]
    Sdk(String),

    #[error("exporter is shut down")]
    AlreadyShutdown,

    #[error("{0}")]
    Other(String),
}

/// Destination for collected metrics.
#[async_trait]
pub trait MetricExporter: Send + Sync {
    /// Name used in logs and aggregated errors.
    fn name(&self) -> &str;

    async fn export(&self, metrics: &mut ResourceMetrics) -> Result<(), ExporterError>;

    async fn shutdown(&self) -> Result<(), ExporterError>;
}

/// A named OpenTelemetry push exporter.
///
/// ```
/// use opentelemetry_sdk::metrics::InMemoryMetricExporter;
/// use sen_metrics::{MetricExporter, PushExporter};
///
/// let exporter = PushExporter::new("in-memory", InMemoryMetricExporter::default());
/// assert_eq!(exporter.name(), "in-memory");
/// ```
pub struct PushExporter<E> {
    name: String,
    inner: E,
    shut_down: AtomicBool,
}

impl<E> PushExporter<E> {
    pub fn new(name: impl Into<String>, inner: E) -> Self {
        Self {
            name: name.into(),
            inner,
            shut_down: AtomicBool::new(false),
        }
    }

    pub fn inner(&self) -> &E {
        &self.inner
    }
}

impl<E> std::fmt::Debug for PushExporter<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PushExporter")
            .field("name", &self.name)
            .field("shut_down", &self.shut_down)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<E: PushMetricExporter> MetricExporter for PushExporter<E> {
    fn name(&self) -> &str {
        &self.name
    }

    async fn export(&self, metrics: &mut ResourceMetrics) -> Result<(), ExporterError> {
        if self.shut_down.load(Ordering::Acquire) {
            return Err(ExporterError::AlreadyShutdown);
        }
        self.inner
            .export(metrics)
            .await
            .map_err(|e| ExporterError::Sdk(e.to_string()))
    }

    async fn shutdown(&self) -> Result<(), ExporterError> {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return Err(ExporterError::AlreadyShutdown);
        }
        self.inner
            .shutdown()
            .map_err(|e| ExporterError::Sdk(e.to_string()))
    }
}

/// Exporter printing every snapshot to stdout.
pub fn stdout_exporter() -> PushExporter<opentelemetry_stdout::MetricExporter> {
    PushExporter::new("stdout", opentelemetry_stdout::MetricExporter::default())
}
