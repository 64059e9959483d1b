//! Process-wide signal state and disposition.
//!
//! The SIGTSTP handler only bumps an atomic counter. Everything user-visible
//! happens later, when the main loop calls [`ModeFlags::take_change`].

use nix::sys::signal::{SaFlags, SigAction, SigHandler, SigSet, Signal, sigaction};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::debug;

/// The foreground-only toggle.
///
/// The mode is the parity of `toggles`; `shown` is the count the main loop
/// last announced.
#[derive(Debug, Default)]
pub struct ModeFlags {
    toggles: AtomicUsize,
    shown: AtomicUsize,
}

impl ModeFlags {
    pub const fn new() -> Self {
        Self {
            toggles: AtomicUsize::new(0),
            shown: AtomicUsize::new(0),
        }
    }

    /// Flip foreground-only mode. Async-signal-safe.
    pub fn toggle(&self) {
        self.toggles.fetch_add(1, Ordering::SeqCst);
    }

    pub fn foreground_only(&self) -> bool {
        self.toggles.load(Ordering::SeqCst) % 2 == 1
    }

    /// Consume a pending mode change, returning the new mode.
    ///
    /// Returns `Some` at most once per batch of toggles. A toggle landing
    /// after the count is read stays pending for the next call.
    pub fn take_change(&self) -> Option<bool> {
        let now = self.toggles.load(Ordering::SeqCst);
        let last = self.shown.swap(now, Ordering::SeqCst);
        (now != last).then_some(now % 2 == 1)
    }
}

/// Flags driven by the real SIGTSTP handler.
pub static MODE_FLAGS: ModeFlags = ModeFlags::new();

extern "C" fn on_sigtstp(_signo: libc::c_int) {
    MODE_FLAGS.toggle();
}

/// Text printed at the first prompt after a mode change.
pub fn mode_notice(foreground_only: bool) -> &'static str {
    if foreground_only {
        "Entering foreground-only mode (& is now ignored)"
    } else {
        "Exiting foreground-only mode"
    }
}

/// Install the interpreter's own dispositions: SIGINT is ignored and SIGTSTP
/// toggles [`MODE_FLAGS`].
pub fn install_shell_handlers() -> nix::Result<()> {
    let ignore = SigAction::new(SigHandler::SigIgn, SaFlags::empty(), SigSet::empty());
    let toggle = SigAction::new(
        SigHandler::Handler(on_sigtstp),
        SaFlags::SA_RESTART,
        SigSet::all(),
    );
    // SAFETY: the handler only touches atomics.
    unsafe {
        sigaction(Signal::SIGINT, &ignore)?;
        sigaction(Signal::SIGTSTP, &toggle)?;
    }
    debug!("installed SIGINT/SIGTSTP handlers");
    Ok(())
}

/// Dispositions applied in a freshly forked child before `exec`.
///
/// Background jobs ignore both SIGINT and SIGTSTP. Foreground jobs get the
/// default SIGINT so the operator can interrupt them, but still ignore SIGTSTP.
pub(crate) fn apply_child_dispositions(background: bool) -> nix::Result<()> {
    let ignore = SigAction::new(SigHandler::SigIgn, SaFlags::empty(), SigSet::empty());
    let default = SigAction::new(SigHandler::SigDfl, SaFlags::empty(), SigSet::empty());
    let on_interrupt = if background { &ignore } else { &default };
    // SAFETY: only the default and ignore dispositions are installed.
    unsafe {
        sigaction(Signal::SIGINT, on_interrupt)?;
        sigaction(Signal::SIGTSTP, &ignore)?;
    }
    Ok(())
}
