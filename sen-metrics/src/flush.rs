//! Flushing metrics exactly once per process
//!
//! Two paths can trigger the final drain-and-release: the command returning
//! normally, and an interrupt arriving while it runs. Both go through the
//! same [`Flusher`], whose [`FlushGate`] lets only the first caller do the
//! work. The interrupt path lives in a background task armed by [`arm`]
//! before the command starts, and kept for the rest of the process.

use std::future::Future;
use std::io;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinHandle;

use crate::error::MetricsError;
use crate::provider::MetricsProvider;

/// Default bound on the drain-and-release sequence.
pub const DEFAULT_FLUSH_DEADLINE: Duration = Duration::from_millis(100);

/// Exit status used after an interrupt-triggered flush.
pub const INTERRUPT_EXIT_CODE: i32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FlushState {
    Pending = 0,
    InProgress = 1,
    Done = 2,
}

impl FlushState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => FlushState::Pending,
            1 => FlushState::InProgress,
            _ => FlushState::Done,
        }
    }
}

/// Single-use gate: `Pending -> InProgress -> Done`.
#[derive(Debug)]
pub struct FlushGate {
    state: AtomicU8,
    done: Notify,
}

impl Default for FlushGate {
    fn default() -> Self {
        Self::new()
    }
}

impl FlushGate {
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(FlushState::Pending as u8),
            done: Notify::new(),
        }
    }

    pub fn state(&self) -> FlushState {
        FlushState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// True for exactly one caller, which must later call [`complete`](Self::complete).
    pub fn try_acquire(&self) -> bool {
        self.state
            .compare_exchange(
                FlushState::Pending as u8,
                FlushState::InProgress as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    pub fn complete(&self) {
        self.state.store(FlushState::Done as u8, Ordering::Release);
        self.done.notify_waiters();
    }

    /// Resolves once the gate reaches `Done`.
    pub async fn wait_done(&self) {
        loop {
            let notified = self.done.notified();
            if self.state() == FlushState::Done {
                return;
            }
            notified.await;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    /// Exported and released within the deadline.
    Flushed,
    /// Another caller owned the gate.
    Skipped,
    /// The deadline elapsed first.
    TimedOut,
    /// Export or release reported an error.
    Failed,
}

/// Bounded-time, run-once drain and release of a [`MetricsProvider`].
///
/// Cheap to clone; clones share the gate.
#[derive(Debug, Clone)]
pub struct Flusher {
    provider: Arc<MetricsProvider>,
    gate: Arc<FlushGate>,
    deadline: Duration,
}

impl Flusher {
    pub fn new(provider: Arc<MetricsProvider>, deadline: Duration) -> Self {
        Self {
            provider,
            gate: Arc::new(FlushGate::new()),
            deadline,
        }
    }

    pub fn state(&self) -> FlushState {
        self.gate.state()
    }

    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    /// Drain and release once. Callers arriving while another flush runs
    /// wait for it (up to the deadline) and report [`FlushOutcome::Skipped`].
    ///
    /// Errors are logged, never returned.
    pub async fn flush(&self) -> FlushOutcome {
        if !self.gate.try_acquire() {
            let _ = tokio::time::timeout(self.deadline, self.gate.wait_done()).await;
            tracing::trace!("metrics already flushed");
            return FlushOutcome::Skipped;
        }

        let outcome = match tokio::time::timeout(self.deadline, self.drain_and_release()).await {
            Ok(true) => FlushOutcome::Flushed,
            Ok(false) => FlushOutcome::Failed,
            Err(_) => {
                let err = MetricsError::ShutdownTimeout(self.deadline);
                tracing::warn!(error = %err, "metrics flush abandoned");
                FlushOutcome::TimedOut
            }
        };
        self.gate.complete();
        outcome
    }

    async fn drain_and_release(&self) -> bool {
        let mut ok = true;
        if let Err(e) = self.provider.drain_and_export().await {
            tracing::warn!(error = %e, "metrics not exported");
            ok = false;
        }
        if let Err(e) = self.provider.release().await {
            tracing::warn!(error = %e, "metrics provider release failed");
            ok = false;
        }
        ok
    }
}

// ============================================================================
// Interrupt Listener
// ============================================================================

/// Interrupt sources, registered with the runtime when constructed.
///
/// A signal delivered any time after [`register`](Self::register) returns
/// is seen by the next [`recv`](Self::recv), even if nothing was polling.
#[derive(Debug)]
pub struct ShutdownSignal {
    #[cfg(unix)]
    interrupt: tokio::signal::unix::Signal,
    #[cfg(unix)]
    terminate: tokio::signal::unix::Signal,
    #[cfg(windows)]
    ctrl_c: tokio::signal::windows::CtrlC,
}

impl ShutdownSignal {
    /// Install handlers for SIGINT and SIGTERM (Ctrl-C on windows).
    ///
    /// Must be called inside a tokio runtime.
    pub fn register() -> io::Result<Self> {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            Ok(Self {
                interrupt: signal(SignalKind::interrupt())?,
                terminate: signal(SignalKind::terminate())?,
            })
        }
        #[cfg(windows)]
        {
            Ok(Self {
                ctrl_c: tokio::signal::windows::ctrl_c()?,
            })
        }
        #[cfg(not(any(unix, windows)))]
        {
            Ok(Self {})
        }
    }

    /// Resolves on the next interrupt.
    pub async fn recv(&mut self) {
        #[cfg(unix)]
        {
            tokio::select! {
                _ = self.interrupt.recv() => {}
                _ = self.terminate.recv() => {}
            }
        }
        #[cfg(windows)]
        {
            self.ctrl_c.recv().await;
        }
        #[cfg(not(any(unix, windows)))]
        {
            std::future::pending::<()>().await;
        }
    }
}

/// Background task that flushes and exits on interrupt.
///
/// The task keeps running after the command returns, so an interrupt that
/// arrives later still ends the process with [`INTERRUPT_EXIT_CODE`]
/// instead of being swallowed by the registered handler. Dropping the
/// handle detaches the task.
#[derive(Debug)]
pub struct InterruptListener {
    task: JoinHandle<()>,
}

impl InterruptListener {
    /// Whether the listener has already fired.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop listening. Only for tests and embedders that own the runtime;
    /// the handlers stay installed.
    pub fn abort(self) {
        self.task.abort();
    }
}

/// Register interrupt handlers now, then listen in the background. On
/// receipt, flush (or wait for the flush in progress) and exit with
/// [`INTERRUPT_EXIT_CODE`].
///
/// Must be called inside a tokio runtime.
pub fn arm(flusher: Flusher) -> io::Result<InterruptListener> {
    let mut signal = ShutdownSignal::register()?;
    Ok(arm_with(
        flusher,
        async move { signal.recv().await },
        || std::process::exit(INTERRUPT_EXIT_CODE),
    ))
}

/// [`arm`] with a custom trigger and exit action.
pub fn arm_with<T, E>(flusher: Flusher, trigger: T, on_interrupt: E) -> InterruptListener
where
    T: Future<Output = ()> + Send + 'static,
    E: FnOnce() + Send + 'static,
{
    let task = tokio::spawn(async move {
        trigger.await;
        match flusher.state() {
            FlushState::Done => tracing::debug!("interrupt received after flush"),
            _ => tracing::debug!("interrupt received, flushing metrics"),
        }
        let outcome = flusher.flush().await;
        tracing::debug!(?outcome, "interrupt flush finished");
        on_interrupt();
    });

    InterruptListener { task }
}
