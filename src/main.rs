use anyhow::Context;
use argh::FromArgs;
use smallsh::env::Environment;
use smallsh::{Config, EditorSource, Interpreter, LineSource, ReaderSource, signals};
use std::fs::File;
use std::io::{self, BufReader};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(FromArgs)]
/// A small shell with background jobs and a foreground-only mode (toggle with Ctrl-Z).
struct Args {
    #[argh(option, default = "100")]
    /// maximum number of concurrently tracked background jobs
    max_jobs: usize,

    #[argh(option, default = "2048")]
    /// longest accepted input line, in characters
    max_line_len: usize,

    #[argh(option, default = "512")]
    /// largest number of arguments on one line
    max_args: usize,

    #[argh(option, default = "String::from(\": \")")]
    /// prompt shown before each line
    prompt: String,

    #[argh(switch, short = 'v')]
    /// log debug events to stderr (SMALLSH_LOG overrides)
    verbose: bool,

    #[argh(positional)]
    /// read commands from this file instead of the terminal
    script: Option<PathBuf>,
}

fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_env("SMALLSH_LOG")
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "warn" }));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn run(args: Args) -> anyhow::Result<ExitCode> {
    signals::install_shell_handlers().context("failed to install signal handlers")?;

    let mut source: Box<dyn LineSource> = match &args.script {
        Some(path) => {
            let file = File::open(path)
                .with_context(|| format!("cannot open script {}", path.display()))?;
            Box::new(ReaderSource::new(BufReader::new(file)))
        }
        None => Box::new(EditorSource::new()?),
    };

    let config = Config {
        max_jobs: args.max_jobs,
        max_line_len: args.max_line_len,
        max_args: args.max_args,
        prompt: args.prompt,
    };
    let mut shell = Interpreter::new(config, Environment::new(), Box::new(io::stdout()));
    let reason = shell.repl(source.as_mut())?;
    Ok(ExitCode::from(reason.exit_code()))
}

fn main() -> ExitCode {
    let args: Args = argh::from_env();
    init_logging(args.verbose);
    match run(args) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("smallsh: {err:#}");
            ExitCode::FAILURE
        }
    }
}
