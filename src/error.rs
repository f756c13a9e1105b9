//! Error types and the typed outcome of running a command graph.

use crate::command::ExitCode;
use nix::errno::Errno;
use std::fmt::Display;
use std::io::IsTerminal;

/// Exit status reported when a command cannot be found.
pub const NOT_FOUND: ExitCode = 127;
/// Exit status for generic failures (parse errors, failed forks, bad builtin arguments).
pub const FAILURE: ExitCode = 1;

/// Errors that abort parsing of a line.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// An operator with nothing on one of its sides, e.g. `| wc` or `ls &&`.
    #[error("syntax error near `{0}`")]
    UnexpectedOperator(&'static str),
    /// A redirection operator not followed by a file name.
    #[error("syntax error: missing file name after `{0}`")]
    MissingRedirectTarget(&'static str),
    /// A stage made only of redirections.
    #[error("syntax error: redirection without a command")]
    MissingCommand,
}

/// Errors raised while executing a command graph.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("command not found: {0}")]
    NotFound(String),
    /// A process-level primitive failed (fork, pipe, exec).
    #[error("{context}: {source}")]
    Spawn {
        context: &'static str,
        #[source]
        source: Errno,
    },
    /// A redirection target could not be opened or installed.
    #[error("{path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    pub fn exit_code(&self) -> ExitCode {
        match self {
            Error::NotFound(_) => NOT_FOUND,
            _ => FAILURE,
        }
    }
}

/// Result of running a unit, converted to a number only at the boundary.
#[derive(Debug)]
pub enum Outcome {
    /// The unit ran to completion with this exit code.
    Exited(ExitCode),
    /// The `exit` builtin asked the shell to terminate with this code.
    Exit(ExitCode),
    /// The unit could not be run at all.
    Failed(Error),
}

impl Outcome {
    pub const SUCCESS: Outcome = Outcome::Exited(0);

    /// Numeric exit status of this outcome.
    pub fn status(&self) -> ExitCode {
        match self {
            Outcome::Exited(code) | Outcome::Exit(code) => *code,
            Outcome::Failed(err) => err.exit_code(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status() == 0
    }
}

impl From<Error> for Outcome {
    fn from(err: Error) -> Self {
        Outcome::Failed(err)
    }
}

/// Print a user-facing diagnostic on standard error.
pub fn report(message: impl Display) {
    if std::io::stderr().is_terminal() {
        eprintln!("\x1b[1;31mlemuen: \x1b[0m{message}");
    } else {
        eprintln!("lemuen: {message}");
    }
}
