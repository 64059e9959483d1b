use crate::env::Environment;
use crate::jobs::JobTable;
use anyhow::Result;
use nix::sys::wait::WaitStatus;
use std::fmt;
use std::io::Write;

/// How a child process finished.
///
/// The shell starts out as if the last command exited with status 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitOutcome {
    /// Normal termination with this exit code.
    Exited(i32),
    /// Killed by this signal number.
    Signaled(i32),
}

impl Default for ExitOutcome {
    fn default() -> Self {
        ExitOutcome::Exited(0)
    }
}

impl ExitOutcome {
    /// Terminal outcome carried by a wait status, if there is one.
    pub fn from_wait_status(status: WaitStatus) -> Option<Self> {
        match status {
            WaitStatus::Exited(_, code) => Some(ExitOutcome::Exited(code)),
            WaitStatus::Signaled(_, signal, _) => Some(ExitOutcome::Signaled(signal as i32)),
            _ => None,
        }
    }
}

/// Lower-case form used in status lines, e.g. `exit value 1`.
impl fmt::Display for ExitOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitOutcome::Exited(code) => write!(f, "exit value {code}"),
            ExitOutcome::Signaled(signal) => write!(f, "terminated by signal {signal}"),
        }
    }
}

/// Everything a command may touch while it runs.
pub struct Context<'a> {
    pub env: &'a mut Environment,
    pub jobs: &'a mut JobTable,
    /// Destination for user-visible status lines.
    pub printer: &'a mut dyn Write,
}

/// Object-safe trait for any command that can be executed by the shell.
///
/// Implemented by built-ins via a blanket impl and by external commands.
pub trait ExecutableCommand {
    fn execute(self: Box<Self>, ctx: &mut Context<'_>) -> Result<()>;
}

/// Factory that tries to create a command from a name and its arguments.
///
/// Returns `None` when the factory doesn't recognize the `name`.
pub trait CommandFactory {
    fn try_create(
        &self,
        env: &Environment,
        name: &str,
        args: &[&str],
    ) -> Option<Box<dyn ExecutableCommand>>;
}
