//! # sen-metrics: consent-gated invocation metrics for sen-command CLIs
//!
//! Every invocation of a command in a [`sen_command::CommandTree`] records
//! one increment on a counter named after the command path. Supplied flags
//! become presence-only labels. Metrics are only collected after the user
//! opts in, and are flushed exactly once per process, whether the command
//! returns or the process is interrupted.
//!
//! ## Quick Start
//!
//! ```
//! use opentelemetry_sdk::metrics::InMemoryMetricExporter;
//! use sen_command::{Command, CommandTree, FlagSpec};
//! use sen_metrics::consent::{AutoConsentPrompt, MemoryConsentStore};
//! use sen_metrics::snapshot::counter_value;
//! use sen_metrics::{Config, ConsentResolver, LabelSet, MeteredCommand};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let tree = CommandTree::new(
//!     Command::new("myapp").subcommand(
//!         Command::new("sync")
//!             .flag(FlagSpec::switch("force"))
//!             .run(|_| Ok("synced")),
//!     ),
//! );
//!
//! let exporter = InMemoryMetricExporter::default();
//! let config = Config::builder(tree.root_name())
//!     .push_exporter("in-memory", exporter.clone())
//!     .build()
//!     .unwrap();
//! let consent = ConsentResolver::new(MemoryConsentStore::new(), AutoConsentPrompt::allow(), false);
//! let app = MeteredCommand::setup_with_consent(tree, &config, consent).unwrap();
//!
//! app.execute(["sync", "--force"]).await.unwrap();
//!
//! let exported = exporter.get_finished_metrics().unwrap();
//! let labels = LabelSet::new().with("force", 1_i64).with("tty", false);
//! assert_eq!(counter_value(&exported[0], "sync", &labels), Some(1));
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`attributes`]: invocation path and label set
//! - [`consent`]: persisted opt-in decision and the prompt
//! - [`provider`]: OpenTelemetry meter provider with a pull reader
//! - [`export`]: named exporters, including any OpenTelemetry push exporter
//! - [`snapshot`]: reading counters back out of a collected snapshot
//! - [`flush`]: run-once flush and the interrupt listener
//! - [`logging`]: stderr tracing subscriber

pub mod attributes;
pub mod command;
pub mod config;
pub mod consent;
pub mod decorate;
pub mod error;
pub mod export;
pub mod flush;
pub mod logging;
pub mod provider;
pub mod snapshot;
pub mod terminal;

pub use attributes::{invocation_labels, invocation_path, LabelSet, LabelValue, ROOT_PATH, TTY_LABEL};
pub use command::MeteredCommand;
pub use config::{Config, ConfigBuilder};
pub use consent::{ConsentDecision, ConsentError, ConsentResolver, ConsentState};
pub use decorate::{InstrumentedHooks, InvocationRecorder};
pub use error::{ExportFailure, MetricsError};
pub use export::{stdout_exporter, ExporterError, MetricExporter, PushExporter};
pub use flush::{
    FlushOutcome, FlushState, Flusher, InterruptListener, ShutdownSignal, DEFAULT_FLUSH_DEADLINE,
};
pub use provider::MetricsProvider;
