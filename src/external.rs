use crate::command::ExitCode;
use crate::env::Environment;
use crate::error::ShellError;
use std::io::{self, Read};
use std::path::PathBuf;
use std::process::{Child, ChildStdout, Command, ExitStatus, Stdio};
use std::thread;
use tracing::debug;

/// A resolved pipeline stage that is not a builtin.
#[derive(Debug, Clone)]
pub struct ExternalCommand {
    name: String,
    program: PathBuf,
    args: Vec<String>,
    vars: Vec<(String, String)>,
}

impl ExternalCommand {
    pub fn new(name: impl Into<String>, program: PathBuf, args: Vec<String>) -> Self {
        Self {
            name: name.into(),
            program,
            args,
            vars: Vec::new(),
        }
    }

    /// Add variables visible to this process only.
    pub fn with_vars(mut self, vars: impl IntoIterator<Item = (String, String)>) -> Self {
        self.vars.extend(vars);
        self
    }

    fn spawn(&self, env: &Environment, stdin: Stdio) -> io::Result<Child> {
        Command::new(&self.program)
            .args(&self.args)
            .env_clear()
            .envs(&env.vars)
            .envs(self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .current_dir(env.config.working_dir())
            .stdin(stdin)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
    }
}

/// Everything a finished pipeline produced.
#[derive(Debug, Default)]
pub struct CapturedOutput {
    /// Standard output of the last stage.
    pub stdout: Vec<u8>,
    /// Standard error of every stage, in stage order.
    pub stderr: Vec<u8>,
    /// Exit code of the last stage.
    pub status: ExitCode,
}

/// Run `commands` as one pipeline and wait for all of them.
///
/// Every stage is started in order, stage N's stdout feeding stage N+1's
/// stdin through an OS pipe. `stdin` goes to the first stage. The last
/// stage's stdout and all stderr streams are drained concurrently so no stage
/// blocks on a full pipe. If a stage cannot be started, the stages already
/// running are killed and reaped before the error is returned.
pub fn run_pipeline(
    commands: &[ExternalCommand],
    env: &Environment,
    stdin: Stdio,
) -> Result<CapturedOutput, ShellError> {
    let mut stdin = Some(stdin);
    let mut upstream: Option<ChildStdout> = None;
    let mut children: Vec<Child> = Vec::with_capacity(commands.len());

    for (i, command) in commands.iter().enumerate() {
        let input = upstream
            .take()
            .map(Stdio::from)
            .or_else(|| stdin.take())
            .unwrap_or_else(Stdio::null);
        match command.spawn(env, input) {
            Ok(mut child) => {
                debug!(
                    stage = i,
                    program = %command.program.display(),
                    pid = child.id(),
                    "spawned"
                );
                if i + 1 < commands.len() {
                    upstream = child.stdout.take();
                }
                children.push(child);
            }
            Err(err) => {
                reap(&mut children);
                return Err(ShellError::external(&command.name, &err));
            }
        }
    }

    let stdout = children.last_mut().and_then(|child| child.stdout.take());
    let stderrs: Vec<_> = children
        .iter_mut()
        .filter_map(|child| child.stderr.take())
        .collect();

    let (stdout, stderr) = thread::scope(|scope| {
        let stdout = scope.spawn(move || drain(stdout));
        let stderrs: Vec<_> = stderrs
            .into_iter()
            .map(|pipe| scope.spawn(move || drain(Some(pipe))))
            .collect();

        let stdout = join(stdout);
        let mut stderr = Vec::new();
        for handle in stderrs {
            stderr.extend(join(handle)?);
        }
        Ok::<_, io::Error>((stdout?, stderr))
    })
    .map_err(|err| {
        reap(&mut children);
        drain_error(commands, &err)
    })?;

    let mut status = 0;
    for (command, child) in commands.iter().zip(children.iter_mut()) {
        let exit = child
            .wait()
            .map_err(|err| ShellError::external(&command.name, &err))?;
        status = exit_code(exit);
        debug!(command = %command.name, status, "exited");
    }

    Ok(CapturedOutput {
        stdout,
        stderr,
        status,
    })
}

fn drain<R: Read>(pipe: Option<R>) -> io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        pipe.read_to_end(&mut buf)?;
    }
    Ok(buf)
}

fn join(handle: thread::ScopedJoinHandle<'_, io::Result<Vec<u8>>>) -> io::Result<Vec<u8>> {
    handle
        .join()
        .unwrap_or_else(|_| Err(io::Error::other("pipe reader panicked")))
}

fn drain_error(commands: &[ExternalCommand], err: &io::Error) -> ShellError {
    let name = commands.last().map(|c| c.name.as_str()).unwrap_or_default();
    ShellError::external(name, err)
}

/// Kill and wait for every started stage so none is left behind.
fn reap(children: &mut [Child]) {
    for child in children.iter_mut() {
        drop(child.stdout.take());
        drop(child.stderr.take());
        let _ = child.kill();
        let _ = child.wait();
    }
}

fn exit_code(exit_status: ExitStatus) -> ExitCode {
    match exit_status.code() {
        Some(x) => x,
        None => terminated_by_signal(exit_status),
    }
}

#[cfg(unix)]
fn terminated_by_signal(exit_status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    if let Some(signal) = ExitStatusExt::signal(&exit_status) {
        128 + signal
    } else if ExitStatusExt::core_dumped(&exit_status) {
        255
    } else {
        -1
    }
}

#[cfg(not(unix))]
fn terminated_by_signal(_exit_status: ExitStatus) -> i32 {
    -1
}
