use argh::FromArgs;
use pipesh::{Editor, Environment, ExitCode, LineReader, Runner, StreamReader};
use std::io::{self, Cursor, IsTerminal};
use tracing::warn;

const LOG_ENV: &str = "PIPESH_LOG";

#[derive(FromArgs)]
/// A small shell with pipelines, quoting and variables.
struct Args {
    /// run the given command text instead of reading standard input.
    #[argh(option, short = 'c')]
    command: Option<String>,

    /// log debug diagnostics to standard error.
    #[argh(switch, short = 'v')]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let args: Args = argh::from_env();
    setup_logging(args.verbose);
    let code = run(args)?;
    std::process::exit(code);
}

fn setup_logging(verbose: bool) {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(io::stderr))
        .init();
}

fn run(args: Args) -> anyhow::Result<ExitCode> {
    let mut runner = Runner::new(Environment::new());
    let mut input: Box<dyn LineReader> = match args.command {
        Some(command) => Box::new(StreamReader::new(Cursor::new(command)).without_prompts()),
        None if io::stdin().is_terminal() => match Editor::new() {
            Ok(editor) => {
                runner = runner.with_inherited_stdin();
                Box::new(editor)
            }
            Err(err) => {
                warn!(%err, "line editor unavailable, reading plain stdin");
                Box::new(StreamReader::new(io::stdin().lock()))
            }
        },
        None => Box::new(StreamReader::new(io::stdin().lock())),
    };

    let code = runner.run(input.as_mut(), &mut io::stdout(), &mut io::stderr())?;
    Ok(code)
}
