use crate::command::ExitCode;
use crate::env::Environment;
use crate::error::ShellError;
use argh::{EarlyExit, FromArgs};
use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};

/// Uniform entry point of every builtin: arguments after the command name,
/// the session and the stream to print to.
pub type BuiltinFn = fn(&[String], &mut Environment, &mut dyn Write) -> Result<(), ShellError>;

/// Built-in commands known to the shell at compile time.
///
/// Builtins are parsed using the [`argh`] crate (`FromArgs`) and executed directly
/// in-process without spawning a child process.
pub(crate) trait BuiltinCommand: Sized + FromArgs {
    /// Canonical name of the command, e.g. "cd".
    const NAME: &'static str;

    /// Executes the command against the session.
    fn execute(self, stdout: &mut dyn Write, env: &mut Environment) -> Result<(), ShellError>;
}

fn dispatch<T: BuiltinCommand>(
    args: &[String],
    env: &mut Environment,
    stdout: &mut dyn Write,
) -> Result<(), ShellError> {
    // Only a leading `--help` is an option; `exit -1` and `cd -dir` are positional.
    let mut argv: Vec<&str> = Vec::with_capacity(args.len() + 1);
    if !matches!(args.first().map(String::as_str), Some("--help" | "--")) {
        argv.push("--");
    }
    argv.extend(args.iter().map(String::as_str));
    match T::from_args(&[T::NAME], &argv) {
        Ok(command) => command.execute(stdout, env),
        Err(EarlyExit { output, status: Ok(()) }) => {
            stdout.write_all(output.as_bytes())?;
            Ok(())
        }
        Err(EarlyExit { output, status: Err(()) }) => {
            Err(ShellError::builtin_argument(T::NAME, output.trim()))
        }
    }
}

/// The builtin table: `cd`, `pwd`, `exit` and `clear`.
pub fn builtins() -> HashMap<&'static str, BuiltinFn> {
    HashMap::from([
        (Cd::NAME, dispatch::<Cd> as BuiltinFn),
        (Pwd::NAME, dispatch::<Pwd> as BuiltinFn),
        (Exit::NAME, dispatch::<Exit> as BuiltinFn),
        (Clear::NAME, dispatch::<Clear> as BuiltinFn),
    ])
}

#[derive(FromArgs)]
/// Print the current working directory to standard output.
pub struct Pwd {}

impl BuiltinCommand for Pwd {
    const NAME: &'static str = "pwd";

    fn execute(self, stdout: &mut dyn Write, env: &mut Environment) -> Result<(), ShellError> {
        writeln!(stdout, "{}", env.config.working_dir().display())?;
        Ok(())
    }
}

#[derive(FromArgs)]
/// Change the current working directory.
/// If no target is provided, changes to the home directory.
pub struct Cd {
    #[argh(positional, greedy)]
    /// directory to switch to, relative to the current one; `~` or nothing means home.
    pub targets: Vec<String>,
}

impl BuiltinCommand for Cd {
    const NAME: &'static str = "cd";

    fn execute(self, _stdout: &mut dyn Write, env: &mut Environment) -> Result<(), ShellError> {
        let target = match self.targets.as_slice() {
            [] => env.config.home_dir().to_path_buf(),
            [dir] if dir == "~" => env.config.home_dir().to_path_buf(),
            [dir] => PathBuf::from(dir),
            _ => return Err(ShellError::builtin_argument(Self::NAME, "too many arguments")),
        };
        let shown = target.display().to_string();

        let dir = normalize(&env.config.working_dir().join(&target));
        let metadata = fs::metadata(&dir).map_err(|err| {
            let message = match err.kind() {
                io::ErrorKind::NotFound => "No such file or directory".to_string(),
                _ => err.to_string(),
            };
            ShellError::filesystem(Self::NAME, &shown, message)
        })?;
        if !metadata.is_dir() {
            return Err(ShellError::filesystem(Self::NAME, shown, "Not a directory"));
        }

        tracing::debug!(dir = %dir.display(), "changed directory");
        env.config.set_working_dir(dir);
        Ok(())
    }
}

/// Resolve `.` and `..` without following symlinks, like a logical `cd`.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out
}

#[derive(FromArgs)]
/// Exit the shell.
pub struct Exit {
    #[argh(positional, greedy)]
    /// exit status of the shell, 0 when omitted.
    pub codes: Vec<String>,
}

impl BuiltinCommand for Exit {
    const NAME: &'static str = "exit";

    fn execute(self, _stdout: &mut dyn Write, env: &mut Environment) -> Result<(), ShellError> {
        let code = match self.codes.as_slice() {
            [] => 0,
            [code] => code.parse::<ExitCode>().map_err(|_| {
                ShellError::builtin_argument(Self::NAME, "numeric argument required")
                    .with_blame(code)
            })?,
            _ => return Err(ShellError::builtin_argument(Self::NAME, "too many arguments")),
        };
        env.exit_request = Some(code);
        Ok(())
    }
}

#[derive(FromArgs)]
/// Clear the terminal screen.
pub struct Clear {}

impl BuiltinCommand for Clear {
    const NAME: &'static str = "clear";

    fn execute(self, stdout: &mut dyn Write, _env: &mut Environment) -> Result<(), ShellError> {
        // cursor home, then erase the whole display
        stdout.write_all(b"\x1b[H\x1b[2J")?;
        stdout.flush()?;
        Ok(())
    }
}
