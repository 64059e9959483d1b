use crate::command::{CommandFactory, Context, ExecutableCommand, ExitOutcome};
use crate::env::Environment;
use crate::interpreter::Factory;
use anyhow::{Context as _, Result};
use argh::{EarlyExit, FromArgs};
use std::env;
use std::fs;
use std::path::PathBuf;
use tracing::debug;

/// Built-in commands known to the shell at compile time.
///
/// Builtins are parsed using the [`argh`] crate (`FromArgs`), so argument-count
/// contracts are enforced before `execute` runs. They never touch
/// `last_status`.
pub(crate) trait BuiltinCommand: Sized + FromArgs {
    /// Canonical name of the command, e.g. "cd".
    fn name() -> &'static str;

    fn execute(self, ctx: &mut Context<'_>) -> Result<()>;
}

impl<T: BuiltinCommand> ExecutableCommand for T {
    fn execute(self: Box<Self>, ctx: &mut Context<'_>) -> Result<()> {
        debug!(builtin = T::name(), "running builtin");
        if let Err(e) = <T as BuiltinCommand>::execute(*self, ctx) {
            writeln!(ctx.printer, "Error: {e:#}")?;
        }
        Ok(())
    }
}

/// Usage error or `--help` output produced while parsing builtin arguments.
struct InvalidArgs {
    name: &'static str,
    output: String,
    is_error: bool,
}

impl ExecutableCommand for InvalidArgs {
    fn execute(self: Box<Self>, ctx: &mut Context<'_>) -> Result<()> {
        let output = self.output.trim_end();
        if self.is_error {
            writeln!(ctx.printer, "Error: {}: {}", self.name, output)?;
        } else {
            writeln!(ctx.printer, "{output}")?;
        }
        Ok(())
    }
}

impl<T: BuiltinCommand + 'static> CommandFactory for Factory<T> {
    fn try_create(
        &self,
        _env: &Environment,
        name: &str,
        args: &[&str],
    ) -> Option<Box<dyn ExecutableCommand>> {
        if name != T::name() {
            return None;
        }
        Some(match T::from_args(&[T::name()], args) {
            Ok(cmd) => Box::new(cmd),
            Err(EarlyExit { output, status }) => Box::new(InvalidArgs {
                name: T::name(),
                output,
                is_error: status.is_err(),
            }),
        })
    }
}

/// Line printed by `status`.
pub fn status_line(outcome: ExitOutcome) -> String {
    match outcome {
        ExitOutcome::Exited(code) => format!("Exit value {code}"),
        ExitOutcome::Signaled(signal) => format!("terminated by signal {signal}"),
    }
}

#[derive(FromArgs)]
/// Terminate all background jobs and leave the shell.
pub struct Exit {}

impl BuiltinCommand for Exit {
    fn name() -> &'static str {
        "exit"
    }

    fn execute(self, ctx: &mut Context<'_>) -> Result<()> {
        ctx.jobs.terminate_all();
        ctx.env.should_exit = true;
        Ok(())
    }
}

#[derive(FromArgs)]
/// Change the current working directory.
/// If no target is provided, changes to the directory specified by the HOME environment variable.
pub struct Cd {
    #[argh(positional)]
    /// directory to switch to; absolute or relative to the current directory. Defaults to $HOME when omitted.
    pub target: Option<String>,
}

impl BuiltinCommand for Cd {
    fn name() -> &'static str {
        "cd"
    }

    fn execute(self, ctx: &mut Context<'_>) -> Result<()> {
        let env = &mut *ctx.env;
        let target = match self.target {
            Some(t) => PathBuf::from(t),
            None => env
                .get_var("HOME")
                .map(PathBuf::from)
                .context("cd: no target and HOME not set")?,
        };

        let new_dir = if target.is_absolute() {
            target
        } else {
            env.current_dir.join(target)
        };

        let canonical = fs::canonicalize(&new_dir)
            .with_context(|| format!("unable to change to directory {}", new_dir.display()))?;

        env::set_current_dir(&canonical)
            .with_context(|| format!("unable to change to directory {}", canonical.display()))?;
        env.current_dir = canonical;
        Ok(())
    }
}

#[derive(FromArgs)]
/// Print the exit value or terminating signal of the last foreground command.
pub struct Status {}

impl BuiltinCommand for Status {
    fn name() -> &'static str {
        "status"
    }

    fn execute(self, ctx: &mut Context<'_>) -> Result<()> {
        writeln!(ctx.printer, "{}", status_line(ctx.env.last_status))?;
        Ok(())
    }
}
