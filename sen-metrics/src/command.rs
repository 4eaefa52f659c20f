//! Instrumented command tree with a guaranteed final flush.

use std::path::Path;
use std::sync::{Arc, OnceLock};

use opentelemetry::metrics::Meter;
use sen_command::{CliError, CliResult, CommandTree, Response};

use crate::config::Config;
use crate::consent::ConsentResolver;
use crate::decorate::{InstrumentedHooks, InvocationRecorder};
use crate::error::MetricsError;
use crate::flush::{self, FlushOutcome, Flusher, InterruptListener};
use crate::provider::MetricsProvider;
use crate::terminal::stdin_is_terminal;

/// A [`CommandTree`] whose every invocation is counted, with metrics
/// flushed exactly once when the process finishes or is interrupted.
///
/// ```no_run
/// use sen_command::{Command, CommandTree, FlagSpec};
/// use sen_metrics::{Config, MeteredCommand};
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let tree = CommandTree::new(
///     Command::new("myapp").subcommand(
///         Command::new("sync")
///             .flag(FlagSpec::switch("force"))
///             .run(|_| Ok("synced")),
///     ),
/// );
/// let config = Config::builder(tree.root_name()).stdout_debug(true).build()?;
/// let app = MeteredCommand::setup(tree, &config)?;
///
/// let args: Vec<String> = std::env::args().skip(1).collect();
/// let response = app.execute(args).await?;
/// println!("{}", response.output);
/// # Ok(())
/// # }
/// ```
///
/// Handlers run on tokio's blocking pool, so a handler that blocks never
/// starves the interrupt listener, whatever the runtime flavor.
#[derive(Debug)]
pub struct MeteredCommand {
    inner: Arc<Instrumented>,
    provider: Arc<MetricsProvider>,
    flusher: Flusher,
    listener: OnceLock<Option<InterruptListener>>,
}

#[derive(Debug)]
struct Instrumented {
    tree: CommandTree,
    hooks: InstrumentedHooks,
}

impl MeteredCommand {
    /// Instrument `tree` with consent read from the file store and prompted
    /// on the terminal.
    ///
    /// Interactivity comes from the config, or from whether stdin is a
    /// terminal when the config leaves it unset.
    pub fn setup(tree: CommandTree, config: &Config) -> Result<Self, MetricsError> {
        let interactive = config.interactive().unwrap_or_else(stdin_is_terminal);
        let consent = ConsentResolver::for_app(
            tree.root_name(),
            config.consent_dir().map(Path::to_path_buf),
            interactive,
        );
        Self::setup_with_consent(tree, config, consent)
    }

    pub fn setup_with_consent(
        tree: CommandTree,
        config: &Config,
        consent: ConsentResolver,
    ) -> Result<Self, MetricsError> {
        let provider = Arc::new(MetricsProvider::from_config(config)?);
        let recorder = Arc::new(InvocationRecorder::new(provider.clone(), consent));
        let hooks = InstrumentedHooks::decorate(&tree, recorder);
        let flusher = Flusher::new(provider.clone(), config.flush_deadline());

        tracing::debug!(
            command = tree.root_name(),
            service = config.service_name(),
            "metrics set up"
        );

        Ok(Self {
            inner: Arc::new(Instrumented { tree, hooks }),
            provider,
            flusher,
            listener: OnceLock::new(),
        })
    }

    pub fn tree(&self) -> &CommandTree {
        &self.inner.tree
    }

    pub fn provider(&self) -> &Arc<MetricsProvider> {
        &self.provider
    }

    /// Meter for extra application instruments.
    pub fn meter(&self) -> &Meter {
        self.provider.meter()
    }

    pub fn flusher(&self) -> &Flusher {
        &self.flusher
    }

    /// Run `args` (program name excluded), then flush.
    ///
    /// The interrupt handlers are installed before the command starts. An
    /// interrupt received from then on flushes and exits the process with
    /// status 1. The command's own result is returned unchanged, whatever
    /// happened to the metrics.
    pub async fn execute<I, S>(&self, args: I) -> CliResult<Response>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.listener.get_or_init(|| match flush::arm(self.flusher.clone()) {
            Ok(listener) => Some(listener),
            Err(e) => {
                tracing::warn!(error = %e, "unable to listen for interrupts");
                None
            }
        });

        let args: Vec<String> = args.into_iter().map(Into::into).collect();
        let inner = self.inner.clone();
        let result =
            match tokio::task::spawn_blocking(move || inner.tree.execute_with(&inner.hooks, args))
                .await
            {
                Ok(result) => result,
                Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
                Err(e) => Err(CliError::system(format!("command task failed: {e}"))),
            };

        self.flusher.flush().await;
        result
    }

    /// Flush now. Later flushes, including the one in
    /// [`execute`](Self::execute), are skipped.
    pub async fn flush(&self) -> FlushOutcome {
        self.flusher.flush().await
    }
}
