//! Dispositions of the job-control signals.

use nix::sys::signal::{SigHandler, Signal, signal};

/// Signals an interactive shell ignores and its children must not inherit ignored.
pub const JOB_CONTROL: [Signal; 5] = [
    Signal::SIGINT,
    Signal::SIGQUIT,
    Signal::SIGTSTP,
    Signal::SIGTTIN,
    Signal::SIGTTOU,
];

fn set_all(signals: &[Signal], handler: SigHandler) -> nix::Result<()> {
    for &sig in signals {
        // SAFETY: only SIG_DFL and SIG_IGN are installed, no handler code runs.
        unsafe { signal(sig, handler) }?;
    }
    Ok(())
}

/// Keep the interactive shell alive when the terminal sends job-control signals
/// meant for a foreground child.
pub fn ignore_job_control() -> nix::Result<()> {
    set_all(&JOB_CONTROL, SigHandler::SigIgn)
}

/// Reset the job-control signals and `SIGPIPE` to their default actions.
/// Called in every forked child before it runs its command.
///
/// `SIGPIPE` is ignored by the Rust runtime at start-up, and an ignored
/// disposition survives `execve`.
pub fn restore_default() -> nix::Result<()> {
    set_all(&JOB_CONTROL, SigHandler::SigDfl)?;
    set_all(&[Signal::SIGPIPE], SigHandler::SigDfl)
}
