//! Lemuen, a small interactive command shell.
//!
//! A line of input is parsed into a [`Command`] graph (pipeline stages linked
//! by `;`, `&&` and `||`) and executed against the OS process primitives:
//! fork/exec, pipes, file redirections and process groups for background
//! jobs. Builtins (`cd`, `pwd`, `echo`, `help`, `export`, `unset`, `exit`)
//! run in the shell process when they stand alone and in a forked child
//! otherwise.
//!
//! The main entry point is [`Interpreter`]. The public modules expose the
//! command model, the parser, the execution environment and the error types.

mod builtin;
pub mod command;
pub mod env;
pub mod error;
mod expand;
pub mod external;
mod interpreter;
pub mod parser;
mod pipeline;
pub mod signal;

pub use command::{Command, ExitCode, LogicOp};
pub use env::Environment;
pub use error::{Error, Outcome, ParseError};
/// Just a convenient re-export of the interactive command runner.
///
/// See [`Interpreter`] for the high-level API.
pub use interpreter::Interpreter;
pub use pipeline::Job;
