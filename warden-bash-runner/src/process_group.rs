//! Process-group helpers for reliable child process cleanup.
//!
//! Every sandboxed command is started as the leader of its own process group
//! so that pipelines, subshells and background jobs it creates can be
//! signalled as one unit:
//! - `set_process_group` runs in `pre_exec` and makes the child a group leader.
//! - `set_parent_death_signal` (Linux only) delivers `SIGTERM` to the child if
//!   the runner dies, re-checking the parent PID to close the fork/exec race.
//! - `kill_process_group` sends `SIGKILL` to a known group; a group that has
//!   already vanished is not an error.
//!
//! On non-Unix platforms these helpers are no-ops.

use std::io;

/// Ensure the child receives SIGTERM when the original parent dies.
///
/// This should run in `pre_exec` and uses `parent_pid` captured before spawn to
/// avoid a race where the parent exits between fork and exec.
#[cfg(target_os = "linux")]
pub fn set_parent_death_signal(parent_pid: libc::pid_t) -> io::Result<()> {
    if unsafe { libc::prctl(libc::PR_SET_PDEATHSIG, libc::SIGTERM) } == -1 {
        return Err(io::Error::last_os_error());
    }

    if unsafe { libc::getppid() } != parent_pid {
        unsafe {
            libc::raise(libc::SIGTERM);
        }
    }

    Ok(())
}

/// No-op on non-Linux platforms.
#[cfg(not(target_os = "linux"))]
pub fn set_parent_death_signal(_parent_pid: i32) -> io::Result<()> {
    Ok(())
}

/// Put the calling process into its own process group.
///
/// Intended for use in `pre_exec` so the child becomes the group leader.
#[cfg(unix)]
pub fn set_process_group() -> io::Result<()> {
    let result = unsafe { libc::setpgid(0, 0) };
    if result == -1 {
        Err(io::Error::last_os_error())
    } else {
        Ok(())
    }
}

/// No-op on non-Unix platforms.
#[cfg(not(unix))]
pub fn set_process_group() -> io::Result<()> {
    Ok(())
}

/// Send SIGKILL to a process group (best-effort).
///
/// A group with no remaining members is treated as already terminated.
#[cfg(unix)]
pub fn kill_process_group(process_group_id: u32) -> io::Result<()> {
    let Ok(pgid) = libc::pid_t::try_from(process_group_id) else {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("process group id {process_group_id} out of range"),
        ));
    };

    if unsafe { libc::killpg(pgid, libc::SIGKILL) } == -1 {
        let err = io::Error::last_os_error();
        if err.raw_os_error() != Some(libc::ESRCH) {
            return Err(err);
        }
    }

    Ok(())
}

/// No-op on non-Unix platforms.
#[cfg(not(unix))]
pub fn kill_process_group(_process_group_id: u32) -> io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    #[test]
    fn test_kill_nonexistent_process_group_is_ok() {
        assert!(kill_process_group(2_000_000_000).is_ok());
    }

    #[cfg(unix)]
    #[test]
    fn test_kill_process_group_delivers_sigkill() {
        use std::os::unix::process::{CommandExt, ExitStatusExt};

        let mut child = unsafe {
            std::process::Command::new("sleep")
                .arg("30")
                .pre_exec(set_process_group)
                .spawn()
                .unwrap()
        };

        kill_process_group(child.id()).unwrap();
        let status = child.wait().unwrap();
        assert_eq!(status.signal(), Some(libc::SIGKILL));
    }
}
