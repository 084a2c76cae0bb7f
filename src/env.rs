use crate::command::ExitCode;
use crate::config::Config;
use std::collections::HashMap;
use std::env as stdenv;

/// Mutable session state shared by the runner, the builtins and the executor.
///
/// The environment contains:
/// - `config`: the configuration record (working directory, prompt, home).
/// - `vars`: shell variables; `$NAME` expands to them and executed commands
///   receive them as their environment.
/// - `exit_request`: set by `exit`; the interactive loop stops once it is set.
#[derive(Debug, Clone)]
pub struct Environment {
    pub config: Config,
    pub vars: HashMap<String, String>,
    pub exit_request: Option<ExitCode>,
}

impl Environment {
    /// Capture the current process state into a new `Environment` instance.
    pub fn new() -> Self {
        Self::with_vars(Config::from_process(), stdenv::vars())
    }

    /// Build an environment that does not look at the process at all.
    pub fn with_vars(config: Config, vars: impl IntoIterator<Item = (String, String)>) -> Self {
        Self {
            config,
            vars: vars.into_iter().collect(),
            exit_request: None,
        }
    }

    /// Get the value of a shell variable.
    pub fn get_var(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    /// Set or override a shell variable.
    pub fn set_var(&mut self, key: impl Into<String>, val: impl Into<String>) {
        self.vars.insert(key.into(), val.into());
    }

    pub fn should_exit(&self) -> bool {
        self.exit_request.is_some()
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}
