//! A small interactive shell with background jobs and a foreground-only mode.
//!
//! Lines are split on whitespace, `$$` expands to the shell's process id, and
//! the built-ins `exit`, `cd` and `status` run in-process. Everything else is
//! forked and exec'd, with optional trailing `< file`, `> file` and `&`.
//! Finished background jobs are reaped and reported right before each prompt,
//! and SIGTSTP toggles a mode in which `&` is ignored.
//!
//! The main entry point is [`Interpreter`]. Line acquisition is pluggable via
//! [`LineSource`]; status lines go to any [`std::io::Write`].

mod builtin;
pub mod command;
pub mod config;
pub mod env;
pub mod expand;
pub mod external;
mod interpreter;
pub mod io_adapters;
pub mod jobs;
pub mod lexer;
pub mod parser;
pub mod signals;

pub use config::Config;
pub use interpreter::{Interpreter, Termination};
pub use io_adapters::{EditorSource, LineSource, ReaderSource};
