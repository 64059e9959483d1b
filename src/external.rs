use crate::command::{CommandFactory, Context, ExecutableCommand, ExitOutcome};
use crate::env::Environment;
use crate::interpreter::Factory;
use crate::jobs::JobError;
use crate::parser::{self, Command, ParsingError};
use crate::signals;
use anyhow::Result;
use nix::errno::Errno;
use nix::fcntl::{OFlag, open};
use nix::sys::stat::Mode;
use nix::sys::wait::waitpid;
use nix::unistd::{ForkResult, Pid, close, dup2, fork, write};
use std::ffi::{CStr, CString, NulError};
use std::os::unix::ffi::OsStrExt;
use std::os::unix::io::RawFd;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

/// A redirect target could not be opened.
pub const EXIT_OPEN_FAILED: i32 = 1;
/// Default failure, also used when the program cannot be executed.
pub const EXIT_DEFAULT: i32 = 2;
/// `dup2` onto stdin/stdout failed.
pub const EXIT_REDIRECT_FAILED: i32 = 3;
/// The background job table was full.
pub const EXIT_TOO_MANY_JOBS: i32 = 4;

const NULL_DEVICE: &CStr = c"/dev/null";

#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("argument contains a NUL byte")]
    NulByte(#[from] NulError),
    #[error("error creating child process")]
    Fork(#[source] Errno),
    #[error("error waiting for child {pid}")]
    Wait { pid: Pid, source: Errno },
    #[error(transparent)]
    Jobs(#[from] JobError),
    #[error("error writing status")]
    Io(#[from] std::io::Error),
}

/// Command that is not a builtin.
pub struct ExternalCommand {
    command: Command,
}

impl ExternalCommand {
    pub fn new(command: Command) -> Self {
        Self { command }
    }
}

/// Tokens that could not be turned into a [`Command`].
struct Unplanned(ParsingError);

impl ExecutableCommand for Unplanned {
    fn execute(self: Box<Self>, _ctx: &mut Context<'_>) -> Result<()> {
        Err(self.0.into())
    }
}

/// Catch-all factory; it goes last in the chain.
impl CommandFactory for Factory<ExternalCommand> {
    fn try_create(
        &self,
        env: &Environment,
        name: &str,
        args: &[&str],
    ) -> Option<Box<dyn ExecutableCommand>> {
        let tokens = std::iter::once(name)
            .chain(args.iter().copied())
            .map(str::to_owned)
            .collect();
        Some(match parser::construct_command(tokens, env.foreground_only()) {
            Ok(command) => Box::new(ExternalCommand::new(command)),
            Err(err) => Box::new(Unplanned(err)),
        })
    }
}

impl ExecutableCommand for ExternalCommand {
    fn execute(self: Box<Self>, ctx: &mut Context<'_>) -> Result<()> {
        launch(&self.command, ctx)?;
        Ok(())
    }
}

/// Fork and exec `command`.
///
/// Foreground commands are waited for and recorded in `last_status`.
/// Background commands are added to the job table; when the table is full
/// the child exits with [`EXIT_TOO_MANY_JOBS`] before `exec`, is reaped here,
/// and the capacity error is returned.
pub fn launch(command: &Command, ctx: &mut Context<'_>) -> Result<(), LaunchError> {
    let over_capacity = command.background && ctx.jobs.is_full();
    let plan = ChildPlan::new(command, over_capacity)?;

    // SAFETY: the child only makes async-signal-safe calls on buffers
    // prepared above, then execs or `_exit`s.
    match unsafe { fork() }.map_err(LaunchError::Fork)? {
        ForkResult::Child => plan.exec(),
        ForkResult::Parent { child } => {
            debug!(pid = %child, program = %command.program, background = command.background, "spawned");
            if !command.background {
                let outcome = wait_for(child)?;
                ctx.env.last_status = outcome;
                if let ExitOutcome::Signaled(_) = outcome {
                    writeln!(ctx.printer, "{outcome}")?;
                }
            } else if over_capacity {
                wait_for(child)?;
                return Err(JobError::Full {
                    limit: ctx.jobs.capacity(),
                }
                .into());
            } else {
                ctx.jobs.insert(child)?;
            }
            Ok(())
        }
    }
}

/// Block until `pid` exits or is killed.
fn wait_for(pid: Pid) -> Result<ExitOutcome, LaunchError> {
    loop {
        match waitpid(pid, None) {
            Ok(status) => {
                if let Some(outcome) = ExitOutcome::from_wait_status(status) {
                    debug!(%pid, %outcome, "foreground wait finished");
                    return Ok(outcome);
                }
            }
            Err(Errno::EINTR) => continue,
            Err(source) => return Err(LaunchError::Wait { pid, source }),
        }
    }
}

fn path_cstring(path: &Path) -> Result<CString, NulError> {
    CString::new(path.as_os_str().as_bytes())
}

/// Everything the child needs, built before `fork`.
struct ChildPlan {
    program: CString,
    // owns the strings `argv_ptrs` points into
    _argv: Vec<CString>,
    argv_ptrs: Vec<*const libc::c_char>,
    output: Option<CString>,
    input: Option<CString>,
    background: bool,
    over_capacity: bool,
}

impl ChildPlan {
    fn new(command: &Command, over_capacity: bool) -> Result<Self, LaunchError> {
        let argv = command
            .args
            .iter()
            .map(|arg| CString::new(arg.as_str()))
            .collect::<Result<Vec<_>, _>>()?;
        let argv_ptrs = argv
            .iter()
            .map(|arg| arg.as_ptr())
            .chain(std::iter::once(std::ptr::null()))
            .collect();
        Ok(Self {
            program: CString::new(command.program.as_str())?,
            _argv: argv,
            argv_ptrs,
            output: command.output_redirect.as_deref().map(path_cstring).transpose()?,
            input: command.input_redirect.as_deref().map(path_cstring).transpose()?,
            background: command.background,
            over_capacity,
        })
    }

    /// Runs in the child; never returns.
    fn exec(&self) -> ! {
        let code = match self.prepare() {
            Ok(()) => {
                // SAFETY: both pointers come from live CStrings and the
                // argument vector is NULL-terminated.
                unsafe { libc::execvp(self.program.as_ptr(), self.argv_ptrs.as_ptr()) };
                let err = Errno::last();
                complain(&[self.program.to_bytes(), b": ", err.desc().as_bytes()]);
                EXIT_DEFAULT
            }
            Err(code) => code,
        };
        // SAFETY: skip atexit handlers and stdio flushing inherited from the shell.
        unsafe { libc::_exit(code) }
    }

    fn prepare(&self) -> Result<(), i32> {
        if self.over_capacity {
            complain(&[b"too many background processes"]);
            return Err(EXIT_TOO_MANY_JOBS);
        }

        let write_flags = OFlag::O_WRONLY | OFlag::O_CREAT | OFlag::O_TRUNC;
        let owner_rw = Mode::S_IRUSR | Mode::S_IWUSR;
        if let Some(path) = &self.output {
            redirect(path, write_flags, owner_rw, libc::STDOUT_FILENO)?;
        }
        if let Some(path) = &self.input {
            redirect(path, OFlag::O_RDONLY, Mode::empty(), libc::STDIN_FILENO)?;
        }
        if self.background {
            if self.input.is_none() {
                redirect(NULL_DEVICE, OFlag::O_RDONLY, Mode::empty(), libc::STDIN_FILENO)?;
            }
            if self.output.is_none() {
                redirect(NULL_DEVICE, OFlag::O_WRONLY, Mode::empty(), libc::STDOUT_FILENO)?;
            }
        }

        signals::apply_child_dispositions(self.background).map_err(|err| {
            complain(&[b"cannot set signal dispositions: ", err.desc().as_bytes()]);
            EXIT_DEFAULT
        })
    }
}

/// Open `path` and make it the child's `target` descriptor.
fn redirect(path: &CStr, flags: OFlag, mode: Mode, target: RawFd) -> Result<(), i32> {
    let fd = open(path, flags, mode).map_err(|err| {
        complain(&[b"cannot open \"", path.to_bytes(), b"\": ", err.desc().as_bytes()]);
        EXIT_OPEN_FAILED
    })?;
    if fd != target {
        dup2(fd, target).map_err(|err| {
            complain(&[b"cannot redirect \"", path.to_bytes(), b"\": ", err.desc().as_bytes()]);
            EXIT_REDIRECT_FAILED
        })?;
        let _ = close(fd);
    }
    Ok(())
}

/// Write one diagnostic line to stderr without allocating.
fn complain(parts: &[&[u8]]) {
    let _ = write(libc::STDERR_FILENO, b"smallsh: ");
    for part in parts {
        let _ = write(libc::STDERR_FILENO, part);
    }
    let _ = write(libc::STDERR_FILENO, b"\n");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::{Finished, JobTable};
    use crate::signals::ModeFlags;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use std::path::PathBuf;
    use std::thread::sleep;
    use std::time::{Duration, Instant};

    fn command(args: &[&str]) -> Command {
        Command {
            program: args[0].to_string(),
            args: args.iter().map(|s| s.to_string()).collect(),
            input_redirect: None,
            output_redirect: None,
            background: false,
        }
    }

    struct Harness {
        env: Environment,
        jobs: JobTable,
        out: Vec<u8>,
    }

    impl Harness {
        fn new(capacity: usize) -> Self {
            let modes: &'static ModeFlags = Box::leak(Box::new(ModeFlags::new()));
            Self {
                env: Environment::with_modes(modes),
                jobs: JobTable::new(capacity),
                out: Vec::new(),
            }
        }

        fn launch(&mut self, command: &Command) -> Result<(), LaunchError> {
            let mut ctx = Context {
                env: &mut self.env,
                jobs: &mut self.jobs,
                printer: &mut self.out,
            };
            launch(command, &mut ctx)
        }

        fn output(&self) -> String {
            String::from_utf8(self.out.clone()).unwrap()
        }

        fn reap_all(&mut self) -> Vec<Finished> {
            let deadline = Instant::now() + Duration::from_secs(10);
            let mut done = Vec::new();
            while !self.jobs.is_empty() && Instant::now() < deadline {
                done.extend(self.jobs.reap());
                sleep(Duration::from_millis(20));
            }
            done
        }
    }

    #[test]
    fn test_foreground_exit_code_is_recorded() {
        let mut h = Harness::new(4);
        h.launch(&command(&["false"])).unwrap();
        assert_eq!(h.env.last_status, ExitOutcome::Exited(1));

        h.launch(&command(&["true"])).unwrap();
        assert_eq!(h.env.last_status, ExitOutcome::Exited(0));
        assert_eq!(h.output(), "");
    }

    #[test]
    fn test_foreground_signal_is_recorded_and_printed() {
        let mut h = Harness::new(4);
        h.launch(&command(&["sh", "-c", "kill -9 $$"])).unwrap();
        assert_eq!(h.env.last_status, ExitOutcome::Signaled(9));
        assert_eq!(h.output(), "terminated by signal 9\n");
    }

    #[test]
    fn test_foreground_child_takes_default_sigint() {
        let mut h = Harness::new(4);
        signals::install_shell_handlers().unwrap();
        h.launch(&command(&["sh", "-c", "kill -INT $$"])).unwrap();
        assert_eq!(h.env.last_status, ExitOutcome::Signaled(2));
        assert_eq!(h.output(), "terminated by signal 2\n");
    }

    #[test]
    fn test_foreground_child_ignores_sigtstp() {
        let mut h = Harness::new(4);
        h.launch(&command(&["sh", "-c", "kill -TSTP $$; exit 7"])).unwrap();
        assert_eq!(h.env.last_status, ExitOutcome::Exited(7));
    }

    #[test]
    fn test_background_child_ignores_sigint_and_sigtstp() {
        use nix::sys::signal::{Signal, kill};

        let mut h = Harness::new(4);
        let mut sleeper = command(&["sleep", "5"]);
        sleeper.background = true;
        h.launch(&sleeper).unwrap();
        let pid = h.jobs.pids().next().unwrap();
        // let the child reach exec
        sleep(Duration::from_millis(200));

        kill(pid, Signal::SIGINT).unwrap();
        kill(pid, Signal::SIGTSTP).unwrap();
        sleep(Duration::from_millis(200));
        assert!(h.jobs.reap().is_empty());
        assert_eq!(h.jobs.len(), 1);

        // a stopped child would leave SIGTERM pending
        kill(pid, Signal::SIGTERM).unwrap();
        let done = h.reap_all();
        assert_eq!(
            done,
            vec![Finished {
                pid,
                outcome: ExitOutcome::Signaled(libc::SIGTERM),
            }]
        );
    }

    #[test]
    fn test_status_write_failure_is_reported() {
        struct Broken;
        impl std::io::Write for Broken {
            fn write(&mut self, _: &[u8]) -> std::io::Result<usize> {
                Err(std::io::ErrorKind::BrokenPipe.into())
            }
            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        let mut h = Harness::new(4);
        let mut printer = Broken;
        let mut ctx = Context {
            env: &mut h.env,
            jobs: &mut h.jobs,
            printer: &mut printer,
        };
        let err = launch(&command(&["sh", "-c", "kill -9 $$"]), &mut ctx).unwrap_err();
        assert!(matches!(err, LaunchError::Io(_)));
        assert_eq!(h.env.last_status, ExitOutcome::Signaled(9));
    }

    #[test]
    fn test_missing_program_exits_with_default_code() {
        let mut h = Harness::new(4);
        h.launch(&command(&["definitely-not-a-program-smallsh"])).unwrap();
        assert_eq!(h.env.last_status, ExitOutcome::Exited(EXIT_DEFAULT));
    }

    #[test]
    fn test_output_then_input_redirect() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out.txt");
        let copy = dir.path().join("copy.txt");
        let mut h = Harness::new(4);

        let mut echo = command(&["echo", "hello", "redirect"]);
        echo.output_redirect = Some(out.clone());
        h.launch(&echo).unwrap();
        assert_eq!(fs::read_to_string(&out).unwrap(), "hello redirect\n");
        let mode = fs::metadata(&out).unwrap().permissions().mode();
        assert_eq!(mode & 0o077, 0, "redirect target must be owner-only");

        let mut cat = command(&["cat"]);
        cat.input_redirect = Some(out.clone());
        cat.output_redirect = Some(copy.clone());
        h.launch(&cat).unwrap();
        assert_eq!(fs::read_to_string(&copy).unwrap(), "hello redirect\n");
        assert_eq!(h.env.last_status, ExitOutcome::Exited(0));
    }

    #[test]
    fn test_output_redirect_truncates() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out.txt");
        fs::write(&out, "a much longer previous content\n").unwrap();

        let mut h = Harness::new(4);
        let mut echo = command(&["echo", "short"]);
        echo.output_redirect = Some(out.clone());
        h.launch(&echo).unwrap();
        assert_eq!(fs::read_to_string(&out).unwrap(), "short\n");
    }

    #[test]
    fn test_unopenable_input_is_fatal_to_child_only() {
        let mut h = Harness::new(4);
        let mut cat = command(&["cat"]);
        cat.input_redirect = Some(PathBuf::from("/nonexistent/smallsh/input"));
        h.launch(&cat).unwrap();
        assert_eq!(h.env.last_status, ExitOutcome::Exited(EXIT_OPEN_FAILED));
    }

    #[test]
    fn test_background_job_is_tracked_and_stdin_is_null() {
        let mut h = Harness::new(4);
        h.env.last_status = ExitOutcome::Exited(7);

        // would block forever on an inherited terminal
        let mut cat = command(&["cat"]);
        cat.background = true;
        h.launch(&cat).unwrap();
        assert_eq!(h.jobs.len(), 1);

        let done = h.reap_all();
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].outcome, ExitOutcome::Exited(0));
        assert_eq!(h.env.last_status, ExitOutcome::Exited(7));
    }

    #[test]
    fn test_full_job_table_rejects_spawn() {
        let mut h = Harness::new(1);
        let mut sleeper = command(&["sleep", "30"]);
        sleeper.background = true;
        h.launch(&sleeper).unwrap();
        let tracked: Vec<_> = h.jobs.pids().collect();

        let err = h.launch(&sleeper).unwrap_err();
        assert!(matches!(err, LaunchError::Jobs(JobError::Full { limit: 1 })));
        assert_eq!(h.jobs.pids().collect::<Vec<_>>(), tracked);
        assert_eq!(h.env.last_status, ExitOutcome::Exited(0));

        h.jobs.terminate_all();
        h.reap_all();
    }

    #[test]
    fn test_nul_byte_is_rejected_before_fork() {
        let mut h = Harness::new(4);
        let err = h.launch(&command(&["echo", "a\0b"])).unwrap_err();
        assert!(matches!(err, LaunchError::NulByte(_)));
    }

    #[test]
    fn test_factory_runs_ampersand_in_foreground_when_mode_is_on() {
        let mut h = Harness::new(4);
        h.env.modes().toggle();
        let cmd = Factory::<ExternalCommand>::default()
            .try_create(&h.env, "false", &["&"])
            .unwrap();
        let mut ctx = Context {
            env: &mut h.env,
            jobs: &mut h.jobs,
            printer: &mut h.out,
        };
        cmd.execute(&mut ctx).unwrap();
        assert!(h.jobs.is_empty());
        assert_eq!(h.env.last_status, ExitOutcome::Exited(1));
    }

    #[test]
    fn test_factory_reports_unplannable_tokens() {
        let mut h = Harness::new(4);
        let cmd = Factory::<ExternalCommand>::default()
            .try_create(&h.env, ">", &["out"])
            .unwrap();
        let mut ctx = Context {
            env: &mut h.env,
            jobs: &mut h.jobs,
            printer: &mut h.out,
        };
        let err = cmd.execute(&mut ctx).unwrap_err();
        assert!(err.to_string().starts_with("missing command"));
    }
}
