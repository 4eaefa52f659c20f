//! Error types for metrics setup, export and shutdown.

use std::time::Duration;

use thiserror::Error;

use crate::consent::ConsentError;
use crate::export::ExporterError;

/// Errors surfaced by the metrics layer.
///
/// Only `Configuration` and `Initialization` abort setup. Everything else is
/// logged and treated as "no metrics for this run".
#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("failed to initialize metrics provider: {0}")]
    Initialization(String),

    #[error(transparent)]
    Consent(#[from] ConsentError),

    #[error("failed to collect metrics: {0}")]
    Collect(String),

    #[error("metric export failed: {}", join_failures(.0))]
    Export(Vec<ExportFailure>),

    #[error("metric exporter shutdown failed: {}", join_failures(.0))]
    Shutdown(Vec<ExportFailure>),

    #[error("metrics flush did not finish within {0:?}")]
    ShutdownTimeout(Duration),
}

/// One exporter's failure inside an aggregated export or shutdown error.
#[derive(Debug, Error)]
#[error("exporter `{exporter}`: {source}")]
pub struct ExportFailure {
    pub exporter: String,
    #[source]
    pub source: ExporterError,
}

fn join_failures(failures: &[ExportFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
