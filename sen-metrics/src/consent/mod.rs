//! User consent for metric collection
//!
//! The decision is a single byte persisted per application under the user
//! config directory:
//!
//! ```text
//! <config-dir>/.<root-command>-metrics-optin    '1' = opted in, '0' = opted out
//! ```
//!
//! # Resolution
//!
//! | Session         | Record            | Result                        |
//! |-----------------|-------------------|-------------------------------|
//! | non-interactive | (not read)        | opted in, nothing written     |
//! | interactive     | `0` / `1`         | adopted, no prompt            |
//! | interactive     | absent            | prompt, then save             |
//! | interactive     | anything else     | treated as corrupt: prompt    |
//! | interactive     | unreadable        | error, collection disabled    |
//!
//! A prompt or save failure is reported, but a decision the user already
//! made is still honoured for the current run.

pub mod prompt;
pub mod store;

pub use prompt::{AutoConsentPrompt, ConsentMessages, ConsentPrompt, TerminalConsentPrompt};
pub use store::{ConsentRecord, ConsentStore, FileConsentStore, MemoryConsentStore};

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

/// Suffix of the per-application consent record file name.
pub const RECORD_SUFFIX: &str = "metrics-optin";

/// File name of the consent record for an application.
pub fn record_file_name(app_name: &str) -> String {
    format!(".{app_name}-{RECORD_SUFFIX}")
}

/// Errors from reading, prompting for or saving consent.
#[derive(Debug, Error)]
pub enum ConsentError {
    #[error(
        "unexpected error reading metric opt-in record {}; metrics will not be collected: {source}",
        .path.display()
    )]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(
        "unable to save metric opt-in record {}; you will be asked again next time: {source}",
        .path.display()
    )]
    Save {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("error prompting for metric collection consent; metrics will not be collected: {0}")]
    Prompt(#[source] io::Error),
}

/// A decision the user made.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsentDecision {
    OptedIn,
    OptedOut,
}

impl ConsentDecision {
    pub fn is_opted_in(self) -> bool {
        self == ConsentDecision::OptedIn
    }

    /// The byte persisted for this decision.
    pub fn as_byte(self) -> u8 {
        match self {
            ConsentDecision::OptedIn => b'1',
            ConsentDecision::OptedOut => b'0',
        }
    }

    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            b'1' => Some(ConsentDecision::OptedIn),
            b'0' => Some(ConsentDecision::OptedOut),
            _ => None,
        }
    }
}

/// Consent state for the current process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConsentState {
    #[default]
    NoDecision,
    OptedIn,
    OptedOut,
}

impl From<ConsentDecision> for ConsentState {
    fn from(decision: ConsentDecision) -> Self {
        match decision {
            ConsentDecision::OptedIn => ConsentState::OptedIn,
            ConsentDecision::OptedOut => ConsentState::OptedOut,
        }
    }
}

/// Outcome of [`ConsentResolver::resolve`].
#[derive(Debug)]
pub struct Resolution {
    pub state: ConsentState,
    pub error: Option<ConsentError>,
}

impl Resolution {
    fn decided(decision: ConsentDecision) -> Self {
        Self {
            state: decision.into(),
            error: None,
        }
    }

    fn failed(error: ConsentError) -> Self {
        Self {
            state: ConsentState::NoDecision,
            error: Some(error),
        }
    }

    /// Collection only happens after an explicit or derived opt-in.
    pub fn allows_collection(&self) -> bool {
        self.state == ConsentState::OptedIn
    }
}

/// Derives the consent state for this run from the store, the prompt and
/// whether the session is interactive.
pub struct ConsentResolver {
    store: Arc<dyn ConsentStore>,
    prompt: Arc<dyn ConsentPrompt>,
    interactive: bool,
}

impl std::fmt::Debug for ConsentResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsentResolver")
            .field("interactive", &self.interactive)
            .finish_non_exhaustive()
    }
}

impl ConsentResolver {
    pub fn new(
        store: impl ConsentStore + 'static,
        prompt: impl ConsentPrompt + 'static,
        interactive: bool,
    ) -> Self {
        Self {
            store: Arc::new(store),
            prompt: Arc::new(prompt),
            interactive,
        }
    }

    /// File-backed store in `dir` (or the user config directory) and a
    /// terminal prompt on stdin/stderr.
    pub fn for_app(app_name: &str, dir: Option<PathBuf>, interactive: bool) -> Self {
        let store = match dir {
            Some(dir) => FileConsentStore::in_dir(dir, app_name),
            None => FileConsentStore::default_for_app(app_name),
        };
        Self::new(store, TerminalConsentPrompt::stdio(), interactive)
    }

    pub fn is_interactive(&self) -> bool {
        self.interactive
    }

    pub fn resolve(&self) -> Resolution {
        if !self.interactive {
            tracing::debug!("non-interactive session, metrics consent derived as opted in");
            return Resolution::decided(ConsentDecision::OptedIn);
        }

        match self.store.load() {
            Ok(ConsentRecord::Decided(decision)) => {
                tracing::debug!(?decision, "metrics consent read from record");
                Resolution::decided(decision)
            }
            Ok(ConsentRecord::Absent) => self.prompt_and_save(),
            Ok(ConsentRecord::Corrupted) => {
                tracing::debug!("metrics consent record corrupted, asking again");
                self.prompt_and_save()
            }
            Err(e) => Resolution::failed(e),
        }
    }

    fn prompt_and_save(&self) -> Resolution {
        let decision = match self.prompt.ask() {
            Ok(decision) => decision,
            Err(e) => return Resolution::failed(e),
        };

        match self.store.save(decision) {
            Ok(()) => Resolution::decided(decision),
            Err(e) => Resolution {
                state: decision.into(),
                error: Some(e),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_file_name() {
        assert_eq!(record_file_name("myapp"), ".myapp-metrics-optin");
    }

    #[test]
    fn test_decision_bytes() {
        assert_eq!(ConsentDecision::from_byte(b'1'), Some(ConsentDecision::OptedIn));
        assert_eq!(ConsentDecision::from_byte(b'0'), Some(ConsentDecision::OptedOut));
        assert_eq!(ConsentDecision::from_byte(b'x'), None);
        assert_eq!(ConsentDecision::OptedOut.as_byte(), b'0');
    }

    #[test]
    fn test_non_interactive_opts_in_without_touching_store() {
        let store = MemoryConsentStore::failing();
        let resolver = ConsentResolver::new(store, AutoConsentPrompt::deny(), false);

        let resolution = resolver.resolve();
        assert_eq!(resolution.state, ConsentState::OptedIn);
        assert!(resolution.error.is_none());
    }

    #[test]
    fn test_existing_record_is_adopted_without_prompt() {
        let store = MemoryConsentStore::with_record(ConsentRecord::Decided(ConsentDecision::OptedOut));
        let prompt = AutoConsentPrompt::allow();
        let resolver = ConsentResolver::new(store.clone(), prompt.clone(), true);

        assert_eq!(resolver.resolve().state, ConsentState::OptedOut);
        assert_eq!(prompt.asked(), 0);
    }

    #[test]
    fn test_absent_record_prompts_and_saves() {
        let store = MemoryConsentStore::new();
        let prompt = AutoConsentPrompt::allow();
        let resolver = ConsentResolver::new(store.clone(), prompt.clone(), true);

        let resolution = resolver.resolve();
        assert!(resolution.allows_collection());
        assert_eq!(prompt.asked(), 1);
        assert_eq!(store.record(), ConsentRecord::Decided(ConsentDecision::OptedIn));
    }

    #[test]
    fn test_corrupted_record_prompts_again() {
        let store = MemoryConsentStore::with_record(ConsentRecord::Corrupted);
        let prompt = AutoConsentPrompt::deny();
        let resolver = ConsentResolver::new(store.clone(), prompt.clone(), true);

        assert_eq!(resolver.resolve().state, ConsentState::OptedOut);
        assert_eq!(prompt.asked(), 1);
        assert_eq!(store.record(), ConsentRecord::Decided(ConsentDecision::OptedOut));
    }

    #[test]
    fn test_read_failure_disables_collection() {
        let resolver = ConsentResolver::new(
            MemoryConsentStore::failing(),
            AutoConsentPrompt::allow(),
            true,
        );

        let resolution = resolver.resolve();
        assert_eq!(resolution.state, ConsentState::NoDecision);
        assert!(matches!(resolution.error, Some(ConsentError::Read { .. })));
    }

    #[test]
    fn test_save_failure_keeps_decision() {
        let store = MemoryConsentStore::new().fail_saves();
        let resolver = ConsentResolver::new(store, AutoConsentPrompt::allow(), true);

        let resolution = resolver.resolve();
        assert_eq!(resolution.state, ConsentState::OptedIn);
        assert!(matches!(resolution.error, Some(ConsentError::Save { .. })));
    }
}
