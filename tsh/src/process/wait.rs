use nix::errno::Errno;
use nix::sys::wait::{WaitPidFlag, WaitStatus, waitpid};
use nix::unistd::Pid;
use tracing::{debug, error};

use super::state::ProcessState;

/// Poll or wait for `pid`.
///
/// Reports `Running` while the process is still running (only possible
/// with `no_hang`) or when the wait was interrupted. A pid that is no
/// longer our child (`ECHILD`, already reaped elsewhere) counts as
/// completed.
pub fn wait_pid_job(pid: Pid, no_hang: bool) -> ProcessState {
    let options = if no_hang {
        Some(WaitPidFlag::WNOHANG)
    } else {
        None
    };

    debug!("⏳ WAIT: waitpid({}, no_hang:{})", pid, no_hang);

    match waitpid(pid, options) {
        Ok(WaitStatus::Exited(pid, status)) => {
            debug!("⏳ WAIT: {} exited with {}", pid, status);
            ProcessState::Completed(status as u8, None)
        }
        Ok(WaitStatus::Signaled(pid, signal, core_dumped)) => {
            debug!(
                "⏳ WAIT: {} terminated by {:?} (core dumped: {})",
                pid, signal, core_dumped
            );
            ProcessState::Completed(1, Some(signal))
        }
        Err(Errno::ECHILD) => {
            // reaped by the interrupt handler or not ours at all
            debug!("⏳ WAIT: {} is not a child (ECHILD)", pid);
            ProcessState::Completed(1, None)
        }
        Ok(WaitStatus::StillAlive) => {
            debug!("⏳ WAIT: {} still running", pid);
            ProcessState::Running
        }
        Err(Errno::EINTR) => {
            debug!("⏳ WAIT: waitpid for {} interrupted", pid);
            ProcessState::Running
        }
        Err(e) => {
            error!("⏳ WAIT: waitpid for {} failed: {}", pid, e);
            ProcessState::Completed(1, None)
        }
        Ok(status) => {
            debug!("⏳ WAIT: ignoring status for {}: {:?}", pid, status);
            ProcessState::Running
        }
    }
}

/// Block until `pid` has terminated.
pub fn wait_until_done(pid: Pid) -> ProcessState {
    loop {
        let state = wait_pid_job(pid, false);
        if state.is_completed() {
            return state;
        }
    }
}
