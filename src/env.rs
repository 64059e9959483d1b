use crate::command::ExitOutcome;
use crate::signals::{MODE_FLAGS, ModeFlags};
use std::env as stdenv;
use std::path::PathBuf;

/// Mutable, interpreter-level state that outlives a single line.
///
/// The environment contains:
/// - `current_dir`: the working directory, kept in sync by `cd`.
/// - `should_exit`: set by `exit`; the REPL stops once it is true.
/// - `last_status`: outcome of the most recent foreground external command.
#[derive(Debug, Clone)]
pub struct Environment {
    pub current_dir: PathBuf,
    pub should_exit: bool,
    pub last_status: ExitOutcome,
    modes: &'static ModeFlags,
}

impl Environment {
    /// Capture the current process state, bound to the real signal-driven mode flags.
    pub fn new() -> Self {
        Self::with_modes(&MODE_FLAGS)
    }

    /// Capture the current process state with a custom set of mode flags.
    pub fn with_modes(modes: &'static ModeFlags) -> Self {
        let current_dir = stdenv::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self {
            current_dir,
            should_exit: false,
            last_status: ExitOutcome::default(),
            modes,
        }
    }

    /// Read a variable from the process environment, the same one children inherit.
    pub fn get_var(&self, key: &str) -> Option<String> {
        stdenv::var(key).ok()
    }

    pub fn modes(&self) -> &'static ModeFlags {
        self.modes
    }

    pub fn foreground_only(&self) -> bool {
        self.modes.foreground_only()
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}
