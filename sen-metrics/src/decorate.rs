//! Wrapping command hooks with invocation recording
//!
//! [`InstrumentedHooks`] is a [`HookTable`] built from a [`CommandTree`]:
//! for every node it holds a pre-run, post-run and help hook that record the
//! invocation and then delegate to whatever the node declared. The tree
//! itself is left untouched.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use sen_command::{CliResult, CommandTree, HelpHook, Hook, HookTable, Invocation, NodeId, Response};

use crate::attributes::{invocation_labels, invocation_path};
use crate::consent::ConsentResolver;
use crate::provider::MetricsProvider;

/// Records one increment per invocation, once consent allows it.
///
/// Consent is resolved lazily on the first invocation and remembered for
/// the rest of the process. A recorder without a provider does nothing.
pub struct InvocationRecorder {
    provider: Option<Arc<MetricsProvider>>,
    consent: Option<ConsentResolver>,
    allowed: OnceLock<bool>,
    interactive: bool,
}

impl std::fmt::Debug for InvocationRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InvocationRecorder")
            .field("initialized", &self.provider.is_some())
            .field("allowed", &self.allowed.get())
            .field("interactive", &self.interactive)
            .finish()
    }
}

impl InvocationRecorder {
    pub fn new(provider: Arc<MetricsProvider>, consent: ConsentResolver) -> Self {
        let interactive = consent.is_interactive();
        Self {
            provider: Some(provider),
            consent: Some(consent),
            allowed: OnceLock::new(),
            interactive,
        }
    }

    /// Recorder used before a provider exists.
    pub fn uninitialized() -> Self {
        Self {
            provider: None,
            consent: None,
            allowed: OnceLock::new(),
            interactive: false,
        }
    }

    /// Whether this process may collect. Resolves consent on first call.
    pub fn collection_allowed(&self) -> bool {
        *self.allowed.get_or_init(|| {
            let Some(consent) = &self.consent else {
                return false;
            };
            let resolution = consent.resolve();
            if let Some(e) = &resolution.error {
                tracing::warn!(error = %e, "metrics consent");
            }
            tracing::debug!(state = ?resolution.state, "metrics consent resolved");
            resolution.allows_collection()
        })
    }

    pub fn record(&self, invocation: &Invocation) {
        let Some(provider) = &self.provider else {
            tracing::trace!("metrics not initialized, invocation not recorded");
            return;
        };
        if !self.collection_allowed() {
            return;
        }
        let labels = invocation_labels(invocation, self.interactive);
        provider.record_invocation(&invocation_path(invocation), &labels);
    }

    pub fn note_completion(&self, invocation: &Invocation) {
        tracing::trace!(command = %invocation_path(invocation), "invocation completed");
    }
}

struct WrappedNode {
    pre_run: Hook,
    post_run: Hook,
    help: HelpHook,
}

/// Per-node wrapped hooks for one [`CommandTree`].
pub struct InstrumentedHooks {
    recorder: Arc<InvocationRecorder>,
    wrapped: HashMap<NodeId, WrappedNode>,
}

impl std::fmt::Debug for InstrumentedHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstrumentedHooks")
            .field("recorder", &self.recorder)
            .field("wrapped", &self.wrapped.len())
            .finish()
    }
}

impl InstrumentedHooks {
    pub fn new(recorder: Arc<InvocationRecorder>) -> Self {
        Self {
            recorder,
            wrapped: HashMap::new(),
        }
    }

    /// Wrap every node of `tree`.
    pub fn decorate(tree: &CommandTree, recorder: Arc<InvocationRecorder>) -> Self {
        let mut hooks = Self::new(recorder);
        hooks.wrap_tree(tree);
        hooks
    }

    pub fn recorder(&self) -> &Arc<InvocationRecorder> {
        &self.recorder
    }

    pub fn is_wrapped(&self, node: NodeId) -> bool {
        self.wrapped.contains_key(&node)
    }

    /// Wrap the nodes not wrapped yet and return how many were added.
    /// Calling it again on the same tree adds nothing.
    pub fn wrap_tree(&mut self, tree: &CommandTree) -> usize {
        let mut added = 0;
        for id in tree.walk() {
            if self.wrapped.contains_key(&id) {
                continue;
            }
            self.wrapped.insert(id, self.wrap_node(tree, id));
            added += 1;
        }
        tracing::debug!(nodes = added, "command hooks instrumented");
        added
    }

    fn wrap_node(&self, tree: &CommandTree, id: NodeId) -> WrappedNode {
        let original_pre = tree.pre_run(id);
        let recorder = self.recorder.clone();
        let pre_run: Hook = Arc::new(move |inv: &Invocation| -> CliResult<()> {
            recorder.record(inv);
            match &original_pre {
                Some(hook) => hook(inv),
                None => Ok(()),
            }
        });

        let original_post = tree.post_run(id);
        let recorder = self.recorder.clone();
        let post_run: Hook = Arc::new(move |inv: &Invocation| -> CliResult<()> {
            recorder.note_completion(inv);
            match &original_post {
                Some(hook) => hook(inv),
                None => Ok(()),
            }
        });

        let original_help = tree.help(id);
        let default_help = tree.render_help(id);
        let recorder = self.recorder.clone();
        let help: HelpHook = Arc::new(move |inv: &Invocation| -> Response {
            recorder.record(inv);
            match &original_help {
                Some(hook) => hook(inv),
                None => Response::text(default_help.clone()),
            }
        });

        WrappedNode {
            pre_run,
            post_run,
            help,
        }
    }
}

impl HookTable for InstrumentedHooks {
    fn pre_run(&self, node: NodeId) -> Option<Hook> {
        self.wrapped.get(&node).map(|w| w.pre_run.clone())
    }

    fn post_run(&self, node: NodeId) -> Option<Hook> {
        self.wrapped.get(&node).map(|w| w.post_run.clone())
    }

    fn help(&self, node: NodeId) -> Option<HelpHook> {
        self.wrapped.get(&node).map(|w| w.help.clone())
    }
}
