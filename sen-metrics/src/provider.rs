//! Metrics provider: one OpenTelemetry meter provider, one pull reader and
//! the exporters the final snapshot is pushed to.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use opentelemetry::metrics::{Counter, Meter, MeterProvider as _};
use opentelemetry_sdk::error::OTelSdkResult;
use opentelemetry_sdk::metrics::data::ResourceMetrics;
use opentelemetry_sdk::metrics::reader::MetricReader;
use opentelemetry_sdk::metrics::{
    InstrumentKind, ManualReader, MetricResult, Pipeline, SdkMeterProvider, Temporality,
};
use opentelemetry_sdk::Resource;

use crate::attributes::LabelSet;
use crate::config::Config;
use crate::error::{ExportFailure, MetricsError};
use crate::export::{stdout_exporter, ExporterError, MetricExporter};

/// Instrumentation scope of every instrument created through the provider.
pub const INSTRUMENTATION_SCOPE: &str = "sen-metrics";

/// Description attached to each per-command counter.
pub const INVOCATION_DESCRIPTION: &str = "Command Invocation";

/// Resource attribute carrying the service name.
pub const SERVICE_NAME_KEY: &str = "service.name";

/// Hands the meter provider a reader the provider can still collect from.
#[derive(Debug, Clone)]
struct SharedReader(Arc<ManualReader>);

impl MetricReader for SharedReader {
    fn register_pipeline(&self, pipeline: Weak<Pipeline>) {
        self.0.register_pipeline(pipeline)
    }

    fn collect(&self, rm: &mut ResourceMetrics) -> MetricResult<()> {
        self.0.collect(rm)
    }

    fn force_flush(&self) -> OTelSdkResult {
        self.0.force_flush()
    }

    fn shutdown(&self) -> OTelSdkResult {
        self.0.shutdown()
    }

    fn temporality(&self, kind: InstrumentKind) -> Temporality {
        self.0.temporality(kind)
    }
}

/// Owns the instruments and exporters for one process.
///
/// Created once at setup and passed by handle to the hooks and the flusher.
pub struct MetricsProvider {
    resource: Resource,
    provider: SdkMeterProvider,
    meter: Meter,
    reader: SharedReader,
    counters: Mutex<HashMap<String, Counter<u64>>>,
    exporters: Vec<Arc<dyn MetricExporter>>,
    released: AtomicBool,
}

impl std::fmt::Debug for MetricsProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsProvider")
            .field("service_name", &self.service_name())
            .field(
                "exporters",
                &self.exporters.iter().map(|e| e.name()).collect::<Vec<_>>(),
            )
            .field("released", &self.released)
            .finish_non_exhaustive()
    }
}

impl MetricsProvider {
    pub fn initialize(
        service_name: &str,
        exporters: Vec<Arc<dyn MetricExporter>>,
    ) -> Result<Self, MetricsError> {
        if service_name.trim().is_empty() {
            return Err(MetricsError::Configuration(
                "service name must not be empty".into(),
            ));
        }

        let resource = Resource::builder()
            .with_service_name(service_name.to_string())
            .build();
        let reader = SharedReader(Arc::new(ManualReader::builder().build()));
        let provider = SdkMeterProvider::builder()
            .with_resource(resource.clone())
            .with_reader(reader.clone())
            .build();
        let meter = provider.meter(INSTRUMENTATION_SCOPE);

        tracing::debug!(
            service = service_name,
            exporters = exporters.len(),
            "metrics provider initialized"
        );

        Ok(Self {
            resource,
            provider,
            meter,
            reader,
            counters: Mutex::new(HashMap::new()),
            exporters,
            released: AtomicBool::new(false),
        })
    }

    /// Provider for a built [`Config`], adding the stdout exporter when
    /// debugging is enabled.
    pub fn from_config(config: &Config) -> Result<Self, MetricsError> {
        let mut exporters = config.exporters().to_vec();
        if config.stdout_debug() {
            exporters.push(Arc::new(stdout_exporter()));
        }
        Self::initialize(config.service_name(), exporters)
    }

    pub fn resource(&self) -> &Resource {
        &self.resource
    }

    pub fn service_name(&self) -> Option<String> {
        self.resource
            .iter()
            .find(|(key, _)| key.as_str() == SERVICE_NAME_KEY)
            .map(|(_, value)| value.to_string())
    }

    /// Meter for application-defined instruments. Their readings are
    /// exported together with the invocation counters.
    pub fn meter(&self) -> &Meter {
        &self.meter
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }

    /// Add one to the counter named `path`.
    pub fn record_invocation(&self, path: &str, labels: &LabelSet) {
        if self.is_released() {
            tracing::debug!(path, "provider released, invocation not recorded");
            return;
        }
        let counter = {
            let mut counters = self.counters.lock().unwrap_or_else(PoisonError::into_inner);
            counters
                .entry(path.to_string())
                .or_insert_with(|| {
                    self.meter
                        .u64_counter(path.to_string())
                        .with_description(INVOCATION_DESCRIPTION)
                        .with_unit("1")
                        .build()
                })
                .clone()
        };
        counter.add(1, &labels.to_key_values());
        tracing::trace!(path, labels = labels.len(), "invocation recorded");
    }

    /// Pull the current readings without exporting them.
    pub fn collect(&self) -> Result<ResourceMetrics, MetricsError> {
        let mut snapshot = ResourceMetrics {
            resource: self.resource.clone(),
            scope_metrics: Vec::new(),
        };
        self.reader
            .collect(&mut snapshot)
            .map_err(|e| MetricsError::Collect(e.to_string()))?;
        Ok(snapshot)
    }

    /// Snapshot the readings and push them to every exporter in
    /// registration order, even when nothing was recorded. One failing
    /// exporter does not stop the others.
    pub async fn drain_and_export(&self) -> Result<(), MetricsError> {
        if self.is_released() {
            return Ok(());
        }

        let mut snapshot = self.collect()?;

        let mut failures = Vec::new();
        for exporter in &self.exporters {
            if let Err(source) = exporter.export(&mut snapshot).await {
                tracing::debug!(exporter = exporter.name(), error = %source, "metric export failed");
                failures.push(ExportFailure {
                    exporter: exporter.name().to_string(),
                    source,
                });
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(MetricsError::Export(failures))
        }
    }

    /// Shut down the meter provider and every exporter. Only the first call
    /// does anything.
    pub async fn release(&self) -> Result<(), MetricsError> {
        if self.released.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        let mut failures = Vec::new();
        if let Err(e) = self.provider.shutdown() {
            failures.push(ExportFailure {
                exporter: "meter-provider".to_string(),
                source: ExporterError::Sdk(e.to_string()),
            });
        }
        for exporter in &self.exporters {
            if let Err(source) = exporter.shutdown().await {
                failures.push(ExportFailure {
                    exporter: exporter.name().to_string(),
                    source,
                });
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(MetricsError::Shutdown(failures))
        }
    }
}
