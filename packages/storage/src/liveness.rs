//! Process liveness checks.

use std::io;

/// Answer of a successful liveness check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    Alive,
    Dead,
}

/// Capability to ask whether a process identifier is still active.
///
/// An `Err` means the answer is indeterminate; callers must treat that as
/// alive and never reclaim work on it.
pub trait LivenessCheck: Send + Sync {
    fn check(&self, pid: u32) -> io::Result<Liveness>;
}

/// Checks liveness with `kill(pid, 0)`.
///
/// - success: the process exists and we may signal it
/// - `ESRCH`: no such process
/// - anything else (`EPERM` for another user's process): indeterminate
#[derive(Debug, Clone, Copy, Default)]
pub struct SignalCheck;

impl LivenessCheck for SignalCheck {
    #[cfg(unix)]
    #[allow(unsafe_code)]
    fn check(&self, pid: u32) -> io::Result<Liveness> {
        let pid = match libc::pid_t::try_from(pid) {
            Ok(pid) if pid > 0 => pid,
            _ => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("{pid} is not a single-process pid"),
                ));
            }
        };

        // SAFETY: signal 0 performs the existence and permission checks
        // without delivering anything; pid is positive so it names exactly one
        // process, never a group.
        let ret = unsafe { libc::kill(pid, 0) };
        if ret == 0 {
            return Ok(Liveness::Alive);
        }

        let err = io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::ESRCH) {
            Ok(Liveness::Dead)
        } else {
            Err(err)
        }
    }

    #[cfg(not(unix))]
    fn check(&self, _pid: u32) -> io::Result<Liveness> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "process liveness checks require a unix target",
        ))
    }
}
