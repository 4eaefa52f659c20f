//! Asking the user for consent
//!
//! The terminal prompt writes to the error stream so it never mixes with
//! command output, and reads a single line per attempt from its input.

use std::io::{self, BufRead, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use super::{ConsentDecision, ConsentError};

/// Source of a consent decision.
pub trait ConsentPrompt: Send + Sync {
    fn ask(&self) -> Result<ConsentDecision, ConsentError>;
}

/// Text shown by [`TerminalConsentPrompt`].
#[derive(Debug, Clone)]
pub struct ConsentMessages {
    pub banner: String,
    pub question: String,
    pub opted_in: String,
    pub opted_out: String,
    pub retry: String,
}

impl Default for ConsentMessages {
    fn default() -> Self {
        Self {
            banner: concat!(
                "\n",
                "#######################################################\n",
                "#                                                     #\n",
                "# This command line tool would like to collect        #\n",
                "# anonymous usage metrics to help us build a better   #\n",
                "# tool. Only command names and which flags were used  #\n",
                "# are recorded, never their values.                   #\n",
                "#                                                     #\n",
                "# Metrics are only collected if you opt in.           #\n",
                "#                                                     #\n",
                "#######################################################\n",
            )
            .to_string(),
            question: "\nWould you like to share anonymous usage stats with\nthe developers of this tool? (y|N) "
                .to_string(),
            opted_in: "\nThank you for sharing!".to_string(),
            opted_out: "\nYou have opted out. We will not collect metrics.".to_string(),
            retry: "\nInvalid value detected. Only Y and N are allowed...".to_string(),
        }
    }
}

// ============================================================================
// Terminal Prompt
// ============================================================================

/// Interactive yes/no prompt.
///
/// The first non-whitespace character of a line decides: `y` opts in, `n`
/// opts out, case-insensitively. Anything else (including a blank line)
/// prints the retry notice and asks again. End of input counts as `n`.
pub struct TerminalConsentPrompt {
    input: Mutex<Box<dyn BufRead + Send>>,
    output: Mutex<Box<dyn Write + Send>>,
    messages: ConsentMessages,
}

impl std::fmt::Debug for TerminalConsentPrompt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TerminalConsentPrompt")
            .field("messages", &self.messages)
            .finish_non_exhaustive()
    }
}

impl TerminalConsentPrompt {
    /// Prompt on stderr, answers from stdin.
    pub fn stdio() -> Self {
        Self::with_io(io::BufReader::new(io::stdin()), io::stderr())
    }

    pub fn with_io(input: impl BufRead + Send + 'static, output: impl Write + Send + 'static) -> Self {
        Self {
            input: Mutex::new(Box::new(input)),
            output: Mutex::new(Box::new(output)),
            messages: ConsentMessages::default(),
        }
    }

    pub fn messages(mut self, messages: ConsentMessages) -> Self {
        self.messages = messages;
        self
    }

    fn run(&self, input: &mut dyn BufRead, output: &mut dyn Write) -> io::Result<ConsentDecision> {
        let messages = &self.messages;
        output.write_all(messages.banner.as_bytes())?;

        loop {
            output.write_all(messages.question.as_bytes())?;
            output.flush()?;

            let mut line = String::new();
            if input.read_line(&mut line)? == 0 {
                writeln!(output, "{}", messages.opted_out)?;
                return Ok(ConsentDecision::OptedOut);
            }

            match line.trim_start().chars().next().map(|c| c.to_ascii_lowercase()) {
                Some('y') => {
                    writeln!(output, "{}", messages.opted_in)?;
                    return Ok(ConsentDecision::OptedIn);
                }
                Some('n') => {
                    writeln!(output, "{}", messages.opted_out)?;
                    return Ok(ConsentDecision::OptedOut);
                }
                _ => writeln!(output, "{}", messages.retry)?,
            }
        }
    }
}

impl ConsentPrompt for TerminalConsentPrompt {
    fn ask(&self) -> Result<ConsentDecision, ConsentError> {
        let mut input = self.input.lock().unwrap_or_else(PoisonError::into_inner);
        let mut output = self.output.lock().unwrap_or_else(PoisonError::into_inner);
        self.run(&mut **input, &mut **output)
            .map_err(ConsentError::Prompt)
    }
}

// ============================================================================
// Automatic Prompt
// ============================================================================

/// Answers with a fixed decision and counts how often it was asked.
///
/// Clones share the counter.
#[derive(Debug, Clone)]
pub struct AutoConsentPrompt {
    decision: ConsentDecision,
    asked: Arc<AtomicUsize>,
}

impl AutoConsentPrompt {
    pub fn new(decision: ConsentDecision) -> Self {
        Self {
            decision,
            asked: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn allow() -> Self {
        Self::new(ConsentDecision::OptedIn)
    }

    pub fn deny() -> Self {
        Self::new(ConsentDecision::OptedOut)
    }

    pub fn asked(&self) -> usize {
        self.asked.load(Ordering::SeqCst)
    }
}

impl ConsentPrompt for AutoConsentPrompt {
    fn ask(&self) -> Result<ConsentDecision, ConsentError> {
        self.asked.fetch_add(1, Ordering::SeqCst);
        Ok(self.decision)
    }
}
