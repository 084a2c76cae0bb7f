//! Structured errors reported by every stage of the shell.

use std::io;
use thiserror::Error;

/// Broad classification of a [`ShellError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed quoting, pipe or inline assignment.
    Syntax,
    /// No builtin or executable matches the command name.
    CommandNotFound,
    /// A builtin rejected its arguments.
    BuiltinArgument,
    /// A filesystem operation failed, e.g. `cd` into a missing directory.
    Filesystem,
    /// An external process could not be launched or drained.
    ExternalProcess,
    /// Reading input or writing to the caller's streams failed.
    IoStream,
}

/// An error carrying the command it belongs to, a message and an optional
/// blamed token.
///
/// Displays as `[{command}: ][{blame}: ]{message}`. The runner prefixes the
/// shell name when it reports the error.
#[derive(Debug, Error)]
#[error("{}{message}", context(.command, .blame))]
pub struct ShellError {
    kind: ErrorKind,
    command: Option<String>,
    message: String,
    blame: Option<String>,
}

fn context(command: &Option<String>, blame: &Option<String>) -> String {
    let mut out = String::new();
    for part in [command, blame].into_iter().flatten() {
        out.push_str(part);
        out.push_str(": ");
    }
    out
}

impl ShellError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            command: None,
            message: message.into(),
            blame: None,
        }
    }

    /// Attach the command the error belongs to.
    pub fn in_command(mut self, command: impl Into<String>) -> Self {
        self.command = Some(command.into());
        self
    }

    /// Attach the offending token.
    pub fn with_blame(mut self, blame: impl Into<String>) -> Self {
        self.blame = Some(blame.into());
        self
    }

    pub fn syntax(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Syntax, message)
    }

    /// `syntax error near unexpected token `{token}'`
    pub fn unexpected_token(token: &str) -> Self {
        Self::syntax(format!("syntax error near unexpected token `{token}'"))
    }

    pub fn command_not_found(name: &str) -> Self {
        Self::new(ErrorKind::CommandNotFound, "command not found").in_command(name)
    }

    pub fn builtin_argument(command: &str, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::BuiltinArgument, message).in_command(command)
    }

    pub fn filesystem(command: &str, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Filesystem, message)
            .in_command(command)
            .with_blame(path)
    }

    pub fn external(command: &str, err: &io::Error) -> Self {
        Self::new(ErrorKind::ExternalProcess, err.to_string()).in_command(command)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn command(&self) -> Option<&str> {
        self.command.as_deref()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn blame(&self) -> Option<&str> {
        self.blame.as_deref()
    }

    /// Stream failures end the session, everything else is reported and
    /// recovered from.
    pub fn is_fatal(&self) -> bool {
        self.kind == ErrorKind::IoStream
    }
}

impl From<io::Error> for ShellError {
    fn from(err: io::Error) -> Self {
        Self::new(ErrorKind::IoStream, err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_with_command_and_blame() {
        let err = ShellError::filesystem("cd", "/nope", "No such file or directory");
        assert_eq!(err.to_string(), "cd: /nope: No such file or directory");
        assert_eq!(err.kind(), ErrorKind::Filesystem);
    }

    #[test]
    fn test_display_without_command() {
        let err = ShellError::unexpected_token("|");
        assert_eq!(err.to_string(), "syntax error near unexpected token `|'");
        assert_eq!(err.command(), None);
    }

    #[test]
    fn test_io_errors_are_fatal() {
        let err: ShellError = io::Error::new(io::ErrorKind::BrokenPipe, "gone").into();
        assert!(err.is_fatal());
        assert!(!ShellError::command_not_found("nope").is_fatal());
        assert_eq!(
            ShellError::command_not_found("nope").to_string(),
            "nope: command not found"
        );
    }
}
