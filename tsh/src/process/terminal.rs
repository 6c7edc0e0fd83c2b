use libc::STDIN_FILENO;
use nix::sys::signal::{SigSet, SigmaskHow, Signal, killpg, sigprocmask};
use nix::unistd::{Pid, getpgrp, tcgetpgrp, tcsetpgrp};
use tracing::debug;

/// The controlling terminal lent to a foreground process group.
///
/// Taken back for the shell when dropped. SIGTTOU is blocked around that
/// call, since the shell is not the foreground group at that point.
#[derive(Debug)]
pub struct TerminalHandoff {
    shell_pgid: Pid,
    pgid: Pid,
}

impl TerminalHandoff {
    /// Make `pgid` the terminal's foreground group. Returns `None` when
    /// the shell does not own the terminal itself.
    pub fn give_to(pgid: Pid) -> Option<Self> {
        let shell_pgid = getpgrp();
        match tcgetpgrp(STDIN_FILENO) {
            Ok(owner) if owner == shell_pgid => {}
            Ok(owner) => {
                debug!("🖥️ TTY: foreground group is {}, not ours ({})", owner, shell_pgid);
                return None;
            }
            Err(e) => {
                debug!("🖥️ TTY: tcgetpgrp failed: {}", e);
                return None;
            }
        }
        if let Err(e) = tcsetpgrp(STDIN_FILENO, pgid) {
            debug!("🖥️ TTY: tcsetpgrp({}) failed: {}", pgid, e);
            return None;
        }
        debug!("🖥️ TTY: terminal handed to group {}", pgid);
        // a stage that touched the terminal before the handoff was stopped
        if let Err(e) = killpg(pgid, Signal::SIGCONT) {
            debug!("🖥️ TTY: SIGCONT to group {} failed: {}", pgid, e);
        }
        Some(TerminalHandoff { shell_pgid, pgid })
    }
}

impl Drop for TerminalHandoff {
    fn drop(&mut self) {
        let mut ttou = SigSet::empty();
        ttou.add(Signal::SIGTTOU);
        let mut previous = SigSet::empty();
        let blocked = sigprocmask(SigmaskHow::SIG_BLOCK, Some(&ttou), Some(&mut previous)).is_ok();
        let res = tcsetpgrp(STDIN_FILENO, self.shell_pgid);
        if blocked {
            let _ = sigprocmask(SigmaskHow::SIG_SETMASK, Some(&previous), None);
        }
        match res {
            Ok(()) => debug!("🖥️ TTY: terminal back from group {}", self.pgid),
            Err(e) => debug!("🖥️ TTY: failed to take terminal back: {}", e),
        }
    }
}
