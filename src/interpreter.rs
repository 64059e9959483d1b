use crate::command::{CommandFactory, Context};
use crate::config::Config;
use crate::env::Environment;
use crate::expand::Expander;
use crate::io_adapters::{InputError, LineSource};
use crate::jobs::JobTable;
use crate::lexer::{self, LineKind, Limits};
use crate::signals::mode_notice;
use std::io::{self, Write};
use tracing::debug;

/// Factory allows creating instances of ExecutableCommand.
///
/// Only support commands defined in this crate: builtins and ExternalCommand.
pub(crate) struct Factory<T> {
    _phantom: std::marker::PhantomData<T>,
}

impl<T> Default for Factory<T> {
    fn default() -> Self {
        Self {
            _phantom: std::marker::PhantomData,
        }
    }
}

/// Why the read-eval loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The `exit` builtin ran.
    Exit,
    /// The line source ran dry.
    EndOfInput,
    /// The operator interrupted the prompt.
    Interrupted,
}

impl Termination {
    /// Process exit status for the shell itself.
    pub fn exit_code(self) -> u8 {
        match self {
            Termination::Exit | Termination::EndOfInput => 0,
            Termination::Interrupted => 2,
        }
    }
}

/// The interactive command interpreter.
///
/// Each cycle prints any pending foreground-only notice, reaps finished
/// background jobs, reads a line and runs it. Built-ins are tried first; the
/// external launcher is the last factory in the chain.
///
/// Example
/// ```
/// use smallsh::env::Environment;
/// use smallsh::{Config, Interpreter};
/// let mut sh = Interpreter::new(Config::default(), Environment::new(), Box::new(std::io::sink()));
/// sh.execute_line("status").unwrap();
/// ```
pub struct Interpreter {
    env: Environment,
    jobs: JobTable,
    expander: Expander,
    commands: Vec<Box<dyn CommandFactory>>,
    printer: Box<dyn Write>,
    config: Config,
}

impl Interpreter {
    /// Create an interpreter with the default command set.
    pub fn new(config: Config, env: Environment, printer: Box<dyn Write>) -> Self {
        Self {
            env,
            jobs: JobTable::new(config.max_jobs),
            expander: Expander::for_current_process(),
            commands: default_commands(),
            printer,
            config,
        }
    }

    /// Hand one expanded invocation to the first factory that accepts it.
    fn dispatch(&mut self, name: &str, args: &[&str]) -> anyhow::Result<()> {
        for factory in &self.commands {
            if let Some(cmd) = factory.try_create(&self.env, name, args) {
                let mut ctx = Context {
                    env: &mut self.env,
                    jobs: &mut self.jobs,
                    printer: &mut *self.printer,
                };
                return cmd.execute(&mut ctx);
            }
        }
        Err(anyhow::anyhow!("command not found: {}", name))
    }

    /// Tokenize, expand and dispatch one raw line.
    pub fn run_line(&mut self, line: &str) -> anyhow::Result<()> {
        if lexer::classify(line) != LineKind::Command {
            return Ok(());
        }
        let limits = Limits {
            max_line_len: self.config.max_line_len,
            max_args: self.config.max_args,
        };
        let tokens = self.expander.expand_all(lexer::split_into_tokens(line, limits)?);
        debug!(?tokens, "dispatching");

        let Some((name, rest)) = tokens.split_first() else {
            return Ok(());
        };
        let args: Vec<&str> = rest.iter().map(String::as_str).collect();
        self.dispatch(name, &args)
    }

    /// Like [`run_line`](Self::run_line), but reports failures to the printer
    /// instead of returning them.
    pub fn execute_line(&mut self, line: &str) -> io::Result<()> {
        if let Err(e) = self.run_line(line) {
            writeln!(self.printer, "Error: {e:#}")?;
        }
        self.printer.flush()
    }

    /// Cycle-boundary work done right before showing the prompt.
    pub fn prepare_prompt(&mut self) -> io::Result<()> {
        if let Some(foreground_only) = self.env.modes().take_change() {
            writeln!(self.printer, "{}", mode_notice(foreground_only))?;
        }
        for finished in self.jobs.reap() {
            writeln!(self.printer, "{finished}")?;
        }
        self.printer.flush()
    }

    /// Read-eval loop over `source` until `exit`, end of input or an interrupt.
    ///
    /// Background jobs still running when the loop ends receive SIGTERM.
    pub fn repl(&mut self, source: &mut dyn LineSource) -> anyhow::Result<Termination> {
        while !self.env.should_exit {
            self.prepare_prompt()?;
            let line = match source.read_line(&self.config.prompt) {
                Ok(Some(line)) => line,
                Ok(None) => return Ok(self.shutdown(Termination::EndOfInput)),
                Err(InputError::Interrupted) => return Ok(self.shutdown(Termination::Interrupted)),
                Err(err) => {
                    self.jobs.terminate_all();
                    return Err(err.into());
                }
            };
            self.execute_line(&line)?;
        }
        Ok(Termination::Exit)
    }

    fn shutdown(&mut self, reason: Termination) -> Termination {
        debug!(?reason, jobs = self.jobs.len(), "shutting down");
        self.jobs.terminate_all();
        reason
    }
}

fn default_commands() -> Vec<Box<dyn CommandFactory>> {
    use crate::builtin::*;
    use crate::external::ExternalCommand;
    vec![
        Box::new(Factory::<Exit>::default()),
        Box::new(Factory::<Cd>::default()),
        Box::new(Factory::<Status>::default()),
        Box::new(Factory::<ExternalCommand>::default()),
    ]
}
