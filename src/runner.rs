use crate::builtin::{BuiltinFn, builtins};
use crate::command::{ExitCode, Pipeline, Stage};
use crate::env::Environment;
use crate::error::{ErrorKind, ShellError};
use crate::expansion::{ExpansionChain, Scope};
use crate::external::{self, ExternalCommand};
use crate::io_adapters::{Input, LineReader};
use crate::lexer::{Token, Tokenizer};
use crate::parser::construct_pipeline;
use crate::path_searcher::PathSearcher;
use std::collections::HashMap;
use std::ffi::OsStr;
use std::io::Write;
use std::process::Stdio;
use tracing::debug;

const CONTINUATION_PROMPT: &str = "> ";

/// Where the read loop currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerState {
    /// Waiting for the first line of a new command.
    AwaitingCommand,
    /// The command so far is incomplete (open quote, trailing pipe or backslash).
    AwaitingContinuation,
    /// A complete command is being executed.
    Executing,
    /// End of input or `exit`; no more lines are read.
    Terminated,
}

/// The read, tokenize, expand and execute loop of one shell session.
///
/// Example
/// ```
/// use pipesh::{Environment, Runner, StreamReader};
/// use pipesh::config::Config;
///
/// let env = Environment::with_vars(Config::new("/home/ann", "ann", "/home/ann"), []);
/// let mut shell = Runner::new(env);
/// let mut input = StreamReader::new("FOO=bar\nexit 4\n".as_bytes()).without_prompts();
/// let (mut out, mut err) = (Vec::new(), Vec::new());
/// assert_eq!(shell.run(&mut input, &mut out, &mut err).unwrap(), 4);
/// assert_eq!(shell.env().get_var("FOO"), Some("bar"));
/// ```
pub struct Runner {
    tokenizer: Tokenizer,
    chain: ExpansionChain,
    builtins: HashMap<&'static str, BuiltinFn>,
    env: Environment,
    state: RunnerState,
    inherit_stdin: bool,
    last_status: ExitCode,
}

impl Runner {
    pub fn new(env: Environment) -> Self {
        Self {
            tokenizer: Tokenizer::new(),
            chain: ExpansionChain::default(),
            builtins: builtins(),
            env,
            state: RunnerState::AwaitingCommand,
            inherit_stdin: false,
            last_status: 0,
        }
    }

    /// Replace the default expansion chain.
    pub fn with_chain(mut self, chain: ExpansionChain) -> Self {
        self.chain = chain;
        self
    }

    /// Let the first stage of every pipeline read the shell's own stdin.
    ///
    /// Only sensible when commands come from a terminal editor; otherwise the
    /// children would compete with the shell for its input.
    pub fn with_inherited_stdin(mut self) -> Self {
        self.inherit_stdin = true;
        self
    }

    pub fn env(&self) -> &Environment {
        &self.env
    }

    pub fn env_mut(&mut self) -> &mut Environment {
        &mut self.env
    }

    pub fn state(&self) -> RunnerState {
        self.state
    }

    /// Status of the last executed command.
    pub fn last_status(&self) -> ExitCode {
        self.last_status
    }

    /// The prompt for the next line.
    pub fn prompt(&self) -> String {
        match self.state {
            RunnerState::AwaitingContinuation => CONTINUATION_PROMPT.to_string(),
            _ => self.env.config.primary_prompt(),
        }
    }

    /// Read and execute commands until end of input or `exit`.
    ///
    /// Returns the code passed to `exit`, or the last status at end of input.
    /// Only stream failures escape as errors; everything else is reported on
    /// `stderr` and the loop carries on.
    pub fn run(
        &mut self,
        input: &mut dyn LineReader,
        stdout: &mut dyn Write,
        stderr: &mut dyn Write,
    ) -> Result<ExitCode, ShellError> {
        while self.state != RunnerState::Terminated {
            let prompt = self.prompt();
            match input.read_line(&prompt, stdout)? {
                Input::Line(line) => self.feed(&line, stdout, stderr)?,
                Input::Interrupted => {
                    debug!("read interrupted, dropping partial command");
                    self.tokenizer.reset();
                    self.state = RunnerState::AwaitingCommand;
                }
                Input::Eof => self.finish_input(stderr)?,
            }
        }
        Ok(self.env.exit_request.unwrap_or(self.last_status))
    }

    /// Feed one physical line; execute the command if it is now complete.
    ///
    /// Syntax errors are reported, but whatever the tokenizer kept from the
    /// line still runs once the command is complete.
    pub fn feed(
        &mut self,
        line: &str,
        stdout: &mut dyn Write,
        stderr: &mut dyn Write,
    ) -> Result<(), ShellError> {
        if let Err(err) = self.tokenizer.tokenize(line) {
            self.report(&err, stderr)?;
        }
        if !self.tokenizer.is_complete() {
            self.state = RunnerState::AwaitingContinuation;
            return Ok(());
        }

        self.state = RunnerState::Executing;
        let result = self.execute_pending(stdout, stderr);
        self.state = if self.env.should_exit() {
            RunnerState::Terminated
        } else {
            RunnerState::AwaitingCommand
        };
        result
    }

    fn finish_input(&mut self, stderr: &mut dyn Write) -> Result<(), ShellError> {
        if self.state == RunnerState::AwaitingContinuation {
            self.tokenizer.reset();
            let err = ShellError::syntax("syntax error: unexpected end of file");
            self.report(&err, stderr)?;
        }
        self.state = RunnerState::Terminated;
        Ok(())
    }

    fn execute_pending(
        &mut self,
        stdout: &mut dyn Write,
        stderr: &mut dyn Write,
    ) -> Result<(), ShellError> {
        let Some(tokens) = self.tokenizer.collect() else {
            return Ok(());
        };
        debug!(?tokens, "collected");

        match self.execute(tokens, stdout, stderr) {
            Err(err) if !err.is_fatal() => self.report(&err, stderr),
            result => result,
        }
    }

    fn execute(
        &mut self,
        tokens: Vec<Token>,
        stdout: &mut dyn Write,
        stderr: &mut dyn Write,
    ) -> Result<(), ShellError> {
        let expanded = self.chain.execute(tokens.clone(), &Scope::new(&self.env));
        let pipeline = construct_pipeline(&expanded);
        debug!(?pipeline, "expanded");

        if let [stage] = pipeline.stages.as_slice() {
            if stage.is_assignment_only() {
                self.assign(&tokens);
                self.last_status = 0;
                return Ok(());
            }
            let builtin = stage.name().and_then(|name| self.builtins.get(name)).copied();
            if let Some(builtin) = builtin {
                builtin(stage.args(), &mut self.env, stdout)?;
                stdout.flush()?;
                self.last_status = 0;
                return Ok(());
            }
        }
        self.run_pipeline(&pipeline, stdout, stderr)
    }

    /// Apply the assignments of an assignment-only command left to right,
    /// expanding each one after the previous has been set (`A=1 B=$A`).
    fn assign(&mut self, tokens: &[Token]) {
        for argument in tokens.split(|token| *token == Token::Space) {
            let expanded = self.chain.execute(argument.to_vec(), &Scope::new(&self.env));
            for stage in construct_pipeline(&expanded).stages {
                for assignment in stage.assignments {
                    self.env.set_var(assignment.name, assignment.value);
                }
            }
        }
    }

    fn run_pipeline(
        &mut self,
        pipeline: &Pipeline,
        stdout: &mut dyn Write,
        stderr: &mut dyn Write,
    ) -> Result<(), ShellError> {
        if pipeline.is_empty() {
            return Ok(());
        }
        let path = self.env.get_var("PATH").unwrap_or_default();
        let searcher = PathSearcher::new(OsStr::new(path));
        let commands = pipeline
            .stages
            .iter()
            .map(|stage| self.resolve(&searcher, stage))
            .collect::<Result<Vec<_>, _>>()?;

        let stdin = if self.inherit_stdin {
            Stdio::inherit()
        } else {
            Stdio::null()
        };
        let output = external::run_pipeline(&commands, &self.env, stdin)?;

        stdout.write_all(&output.stdout)?;
        stdout.flush()?;
        stderr.write_all(&output.stderr)?;
        stderr.flush()?;
        self.last_status = output.status;
        Ok(())
    }

    fn resolve(
        &self,
        searcher: &PathSearcher,
        stage: &Stage,
    ) -> Result<ExternalCommand, ShellError> {
        let name = stage.name().ok_or_else(|| ShellError::unexpected_token("|"))?;
        let mut program = searcher.find_binary(name)?;
        if program.is_relative() {
            program = self.env.config.working_dir().join(program);
        }
        let vars = stage
            .assignments
            .iter()
            .map(|assignment| (assignment.name.clone(), assignment.value.clone()));
        Ok(ExternalCommand::new(name, program, stage.args().to_vec()).with_vars(vars))
    }

    /// Print a recovered error as `{shell}: {error}` and record its status.
    fn report(&mut self, err: &ShellError, stderr: &mut dyn Write) -> Result<(), ShellError> {
        debug!(kind = ?err.kind(), "{err}");
        self.last_status = failure_status(err.kind());
        writeln!(stderr, "{}: {err}", self.env.config.shell_name)?;
        stderr.flush()?;
        Ok(())
    }
}

fn failure_status(kind: ErrorKind) -> ExitCode {
    match kind {
        ErrorKind::Syntax => 2,
        ErrorKind::CommandNotFound => 127,
        _ => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn runner() -> Runner {
        let env = Environment::with_vars(
            Config::new("/home/ann", "ann", "/home/ann/src"),
            [("PATH".to_string(), "/usr/bin:/bin".to_string())],
        );
        Runner::new(env)
    }

    fn feed(runner: &mut Runner, line: &str) -> String {
        let (mut out, mut err) = (Vec::new(), Vec::new());
        runner.feed(line, &mut out, &mut err).unwrap();
        String::from_utf8(err).unwrap()
    }

    #[test]
    fn test_prompts_follow_state() {
        let mut runner = runner();
        assert_eq!(runner.prompt(), "~/src$ ");
        feed(&mut runner, "A='open");
        assert_eq!(runner.state(), RunnerState::AwaitingContinuation);
        assert_eq!(runner.prompt(), "> ");
        feed(&mut runner, "close'");
        assert_eq!(runner.state(), RunnerState::AwaitingCommand);
        assert_eq!(runner.env().get_var("A"), Some("open\nclose"));
    }

    #[test]
    fn test_assignment_sets_variable() {
        let mut runner = runner();
        feed(&mut runner, "FOO=bar BAZ=$FOO");
        assert_eq!(runner.env().get_var("FOO"), Some("bar"));
        assert_eq!(runner.last_status(), 0);
    }

    #[test]
    fn test_syntax_error_keeps_rest_of_command() {
        let mut runner = runner();
        let err = feed(&mut runner, "X=1 =");
        assert_eq!(err, "pipesh: syntax error near unexpected token `='\n");
        assert_eq!(runner.state(), RunnerState::AwaitingCommand);
        assert_eq!(runner.env().get_var("X"), Some("1"));
        assert_eq!(runner.last_status(), 0);
    }

    #[test]
    fn test_syntax_error_in_continued_command() {
        let mut runner = runner();
        feed(&mut runner, "Z=\"one");
        assert_eq!(runner.state(), RunnerState::AwaitingContinuation);
        let err = feed(&mut runner, "two\" =");
        assert!(err.contains("unexpected token `='"), "unexpected report: {err}");
        assert_eq!(runner.state(), RunnerState::AwaitingCommand);
        assert_eq!(runner.env().get_var("Z"), Some("one\ntwo"));
    }

    #[test]
    fn test_assignments_apply_left_to_right() {
        let mut runner = runner();
        feed(&mut runner, "A=1 B=$A C=\"$B-$A\"");
        assert_eq!(runner.env().get_var("B"), Some("1"));
        assert_eq!(runner.env().get_var("C"), Some("1-1"));
    }

    #[test]
    fn test_expanded_name_is_not_an_assignment() {
        let mut runner = runner();
        feed(&mut runner, "FOO=X");
        let err = feed(&mut runner, "$FOO=bar");
        assert_eq!(err, "pipesh: X=bar: command not found\n");
        assert_eq!(runner.env().get_var("X"), None);
    }

    #[test]
    fn test_builtin_error_is_reported() {
        let mut runner = runner();
        let err = feed(&mut runner, "cd a b");
        assert_eq!(err, "pipesh: cd: too many arguments\n");
        assert_eq!(runner.last_status(), 1);
    }

    #[test]
    fn test_unknown_command_status() {
        let mut runner = runner();
        let err = feed(&mut runner, "definitely-not-a-command-xyz");
        assert_eq!(err, "pipesh: definitely-not-a-command-xyz: command not found\n");
        assert_eq!(runner.last_status(), 127);
    }

    #[test]
    fn test_exit_terminates() {
        let mut runner = runner();
        feed(&mut runner, "exit 7");
        assert_eq!(runner.state(), RunnerState::Terminated);
        assert_eq!(runner.env().exit_request, Some(7));
    }

    #[test]
    fn test_custom_chain() {
        fn shout(tokens: Vec<Token>, _scope: &Scope<'_>) -> Vec<Token> {
            tokens
                .into_iter()
                .map(|token| match token {
                    Token::Word(text) => Token::Word(text.to_uppercase()),
                    other => other,
                })
                .collect()
        }
        let mut runner = runner().with_chain(ExpansionChain::default().with_rule(shout));
        feed(&mut runner, "x=1");
        assert_eq!(runner.env().get_var("X"), Some("1"));
    }
}
