//! Holder-process liveness check for drain lease takeover.

/// Whether a process with `pid` exists on this machine.
///
/// Errs on the side of "alive": only a definite "no such process" answer
/// returns `false`. On platforms without a liveness check every PID is reported
/// alive and lease takeover falls back to heartbeat staleness alone.
pub fn process_alive(pid: u32) -> bool {
    #[cfg(unix)]
    {
        let Ok(pid) = libc::pid_t::try_from(pid) else {
            return false;
        };
        if pid <= 0 {
            return false;
        }
        // SAFETY: signal 0 performs only existence and permission checks.
        let rc = unsafe { libc::kill(pid, 0) };
        if rc == 0 {
            return true;
        }
        // EPERM means the process exists but belongs to someone else.
        std::io::Error::last_os_error().raw_os_error() != Some(libc::ESRCH)
    }
    #[cfg(not(unix))]
    {
        let _ = pid;
        true
    }
}
