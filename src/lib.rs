//! A small interactive shell with real pipelines.
//!
//! Input is read line by line and fed to a [`lexer::Tokenizer`] until a command
//! is complete (quotes closed, no trailing pipe or backslash). The tokens are
//! rewritten by an [`expansion::ExpansionChain`] (tilde, variables, escapes),
//! split into pipeline stages and executed: a single stage may be a variable
//! assignment or one of the builtins `cd`, `pwd`, `exit` and `clear`, anything
//! else is looked up on `PATH` and started as a chain of OS processes.
//!
//! The main entry point is [`Runner`], which drives the loop over any
//! [`LineReader`].

mod builtin;
pub mod command;
pub mod config;
pub mod env;
pub mod error;
pub mod expansion;
mod external;
pub mod io_adapters;
pub mod lexer;
mod parser;
pub mod path_searcher;
mod runner;

pub use builtin::{BuiltinFn, builtins};
pub use command::{ExitCode, Pipeline, Stage};
pub use env::Environment;
pub use error::{ErrorKind, ShellError};
pub use io_adapters::{Editor, Input, LineReader, StreamReader};
pub use parser::construct_pipeline;
pub use runner::{Runner, RunnerState};
