//! # sen-command: command trees with replaceable hooks
//!
//! A small command framework: a tree of named nodes, each with declared
//! flags, an optional run handler and optional pre-run, post-run and help
//! hooks. The tree is built once and never mutated afterwards. Code that
//! wants to wrap behaviour around every node (instrumentation, auditing)
//! supplies its own [`HookTable`] instead of rewriting the tree.
//!
//! ## Quick Start
//!
//! ```
//! use sen_command::{Command, CommandTree, FlagSpec, Output};
//!
//! let tree = CommandTree::new(
//!     Command::new("myapp").subcommand(
//!         Command::new("sync")
//!             .flag(FlagSpec::switch("force").short('f'))
//!             .run(|inv| Ok(format!("force={}", inv.is_present("force")))),
//!     ),
//! );
//!
//! let response = tree.execute(["sync", "--force"]).unwrap();
//! assert_eq!(response.exit_code, 0);
//! assert!(matches!(response.output, Output::Text(ref s) if s == "force=true"));
//! ```

mod dispatch;
mod help;
mod invocation;
mod tree;

#[cfg(feature = "clap")]
mod clap_support;

pub use dispatch::HookTable;
pub use invocation::Invocation;
pub use tree::{
    Command, CommandTree, FlagSpec, Handler, HelpHook, Hook, Node, NodeHooks, NodeId,
};

use thiserror::Error;

/// CLI result type.
///
/// Handlers and hooks return `CliResult<T>`; the dispatcher turns the final
/// value into a [`Response`].
pub type CliResult<T> = Result<T, CliError>;

// ============================================================================
// Error Types
// ============================================================================

/// Top-level error type for command execution.
///
/// User errors exit with code 1, system failures with code 101.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    User(#[from] UserError),

    #[error(transparent)]
    System(#[from] SystemError),
}

impl CliError {
    /// Exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::User(_) => 1,
            CliError::System(_) => 101,
        }
    }

    /// Convenience constructor for user errors.
    pub fn user(message: impl Into<String>) -> Self {
        CliError::User(UserError::Generic(message.into()))
    }

    /// Convenience constructor for system errors.
    pub fn system(message: impl Into<String>) -> Self {
        CliError::System(SystemError::Internal(message.into()))
    }
}

/// Errors the user can fix by changing the command line.
#[derive(Debug, Error)]
pub enum UserError {
    #[error("Error: {0}")]
    Generic(String),

    #[error("Error: unknown flag '{flag}' for '{command}'")]
    UnknownFlag { flag: String, command: String },

    #[error("Error: flag '{flag}' needs a value")]
    MissingValue { flag: String },

    #[error("Error: flag '{flag}' does not take a value")]
    UnexpectedValue { flag: String },
}

/// Failures the user cannot fix.
#[derive(Debug, Error)]
pub enum SystemError {
    #[error("Internal Error: {0}\n\nThis is likely a bug.")]
    Internal(String),

    #[error("Internal Error: I/O operation failed: {0}")]
    Io(#[from] std::io::Error),
}

impl From<std::io::Error> for CliError {
    fn from(e: std::io::Error) -> Self {
        CliError::System(SystemError::Io(e))
    }
}

// ============================================================================
// Response Types
// ============================================================================

/// What a command produced: an exit code and something to print.
#[derive(Debug)]
pub struct Response {
    /// Exit code (0 = success, 1 = user error, 101 = system error).
    pub exit_code: i32,

    pub output: Output,
}

impl Response {
    /// Successful response with text output.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            exit_code: 0,
            output: Output::Text(content.into()),
        }
    }

    /// Successful response with nothing to print.
    pub fn silent() -> Self {
        Self {
            exit_code: 0,
            output: Output::Silent,
        }
    }

    /// Error response carrying a rendered message.
    pub fn error(exit_code: i32, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            output: Output::Text(message.into()),
        }
    }
}

impl From<CliError> for Response {
    fn from(err: CliError) -> Self {
        Response::error(err.exit_code(), err.to_string())
    }
}

/// Output carried by a [`Response`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Output {
    Silent,
    Text(String),
}

impl Output {
    pub fn is_empty(&self) -> bool {
        matches!(self, Output::Silent)
    }
}

impl std::fmt::Display for Output {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Output::Silent => Ok(()),
            Output::Text(s) => f.write_str(s),
        }
    }
}

/// Conversion of handler return values into responses.
pub trait IntoResponse {
    fn into_response(self) -> Response;
}

impl IntoResponse for Response {
    fn into_response(self) -> Response {
        self
    }
}

impl IntoResponse for String {
    fn into_response(self) -> Response {
        Response::text(self)
    }
}

impl IntoResponse for &'static str {
    fn into_response(self) -> Response {
        Response::text(self)
    }
}

impl IntoResponse for () {
    fn into_response(self) -> Response {
        Response::silent()
    }
}

impl<T: IntoResponse> IntoResponse for CliResult<T> {
    fn into_response(self) -> Response {
        match self {
            Ok(value) => value.into_response(),
            Err(e) => Response::from(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_error_exit_code() {
        let err = CliError::user("bad input");
        assert_eq!(err.exit_code(), 1);
        assert_eq!(err.to_string(), "Error: bad input");
    }

    #[test]
    fn test_system_error_exit_code() {
        let err = CliError::system("boom");
        assert_eq!(err.exit_code(), 101);
        assert!(err.to_string().contains("likely a bug"));
    }

    #[test]
    fn test_io_error_is_system() {
        let err: CliError = std::io::Error::other("disk").into();
        assert!(matches!(err, CliError::System(SystemError::Io(_))));
    }

    #[test]
    fn test_result_err_into_response() {
        let result: CliResult<String> = Err(UserError::MissingValue {
            flag: "output".into(),
        }
        .into());
        let response = result.into_response();
        assert_eq!(response.exit_code, 1);
        assert_eq!(response.output.to_string(), "Error: flag 'output' needs a value");
    }

    #[test]
    fn test_unit_into_response() {
        let response = ().into_response();
        assert_eq!(response.exit_code, 0);
        assert!(response.output.is_empty());
    }
}
