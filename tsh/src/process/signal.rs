use anyhow::Result;
use libc::{STDERR_FILENO, STDOUT_FILENO};
use nix::errno::Errno;
use nix::sys::signal::{
    SaFlags, SigAction, SigHandler, SigSet, SigmaskHow, Signal, kill, killpg, sigaction,
    sigprocmask,
};
use nix::sys::wait::{WaitPidFlag, WaitStatus, waitpid};
use nix::unistd::{Pid, write};
use std::fmt::Write as _;
use std::os::unix::io::RawFd;
use std::sync::atomic::{AtomicI32, Ordering};
use tracing::{debug, error};

use tsh_types::{APP_NAME, TshError, TshResult};

const NO_PID: i32 = 0;

/// The process the shell is currently waiting on synchronously.
///
/// Shared between the main loop and the SIGINT handler, so every
/// transition is a single atomic store or compare-and-swap.
#[derive(Debug)]
pub struct ForegroundSlot {
    pid: AtomicI32,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum InterruptOutcome {
    /// Nothing in the foreground; the interrupt is swallowed.
    Idle,
    AlreadyExited(Pid),
    Delivered(Pid),
    Failed(Pid),
}

impl ForegroundSlot {
    pub const fn new() -> Self {
        ForegroundSlot {
            pid: AtomicI32::new(NO_PID),
        }
    }

    pub fn set(&self, pid: Pid) {
        self.pid.store(pid.as_raw(), Ordering::SeqCst);
    }

    pub fn clear(&self) {
        self.pid.store(NO_PID, Ordering::SeqCst);
    }

    pub fn get(&self) -> Option<Pid> {
        match self.pid.load(Ordering::SeqCst) {
            NO_PID => None,
            raw => Some(Pid::from_raw(raw)),
        }
    }

    /// Forward an interrupt to the foreground process.
    ///
    /// Runs inside a signal handler: no allocation, no locks, no blocking
    /// calls. The slot is released before returning so the same pid is
    /// never signalled twice.
    pub fn interrupt(&self, signal: Signal) -> InterruptOutcome {
        let raw = self.pid.load(Ordering::SeqCst);
        if raw == NO_PID {
            return InterruptOutcome::Idle;
        }
        let pid = Pid::from_raw(raw);

        let outcome = match waitpid(pid, Some(WaitPidFlag::WNOHANG)) {
            Ok(WaitStatus::StillAlive) => match kill(pid, signal) {
                Ok(_) => InterruptOutcome::Delivered(pid),
                Err(_) => InterruptOutcome::Failed(pid),
            },
            _ => InterruptOutcome::AlreadyExited(pid),
        };
        // a newer foreground pid may have been stored meanwhile; leave it
        let _ = self
            .pid
            .compare_exchange(raw, NO_PID, Ordering::SeqCst, Ordering::SeqCst);
        outcome
    }
}

impl Default for ForegroundSlot {
    fn default() -> Self {
        Self::new()
    }
}

static FOREGROUND: ForegroundSlot = ForegroundSlot::new();
static FORWARD_SIGNAL: AtomicI32 = AtomicI32::new(Signal::SIGINT as i32);

/// The process-wide slot read by the installed SIGINT handler.
pub fn foreground() -> &'static ForegroundSlot {
    &FOREGROUND
}

/// Fixed-size line buffer so the handler can format a pid without allocating.
struct StackLine {
    buf: [u8; 128],
    len: usize,
}

impl StackLine {
    const fn new() -> Self {
        StackLine {
            buf: [0; 128],
            len: 0,
        }
    }

    fn flush_to(&self, fd: RawFd) {
        let _ = write(fd, &self.buf[..self.len]);
    }
}

impl std::fmt::Write for StackLine {
    fn write_str(&mut self, s: &str) -> std::fmt::Result {
        let bytes = s.as_bytes();
        let room = self.buf.len() - self.len;
        let n = bytes.len().min(room);
        self.buf[self.len..self.len + n].copy_from_slice(&bytes[..n]);
        self.len += n;
        if n < bytes.len() {
            return Err(std::fmt::Error);
        }
        Ok(())
    }
}

extern "C" fn handle_sigint(_: libc::c_int) {
    let mut line = StackLine::new();
    let _ = writeln!(line, "{APP_NAME}: got ctrl-C");
    line.flush_to(STDOUT_FILENO);

    let signal = Signal::try_from(FORWARD_SIGNAL.load(Ordering::SeqCst)).unwrap_or(Signal::SIGINT);
    let mut line = StackLine::new();
    match FOREGROUND.interrupt(signal) {
        InterruptOutcome::Delivered(pid) => {
            let _ = writeln!(line, "{APP_NAME}: process {} was killed", pid.as_raw());
            line.flush_to(STDOUT_FILENO);
        }
        InterruptOutcome::Failed(_) => {
            let _ = writeln!(line, "{APP_NAME} error: kill failed");
            line.flush_to(STDERR_FILENO);
        }
        InterruptOutcome::Idle | InterruptOutcome::AlreadyExited(_) => {}
    }
}

/// Install the SIGINT handler that forwards interrupts to the foreground
/// process as `forward`.
pub(crate) fn install_interrupt_handler(forward: Signal) -> Result<()> {
    tracing::info!("🔧 SIGNAL: Installing SIGINT handler (forwarding {:?})", forward);
    FORWARD_SIGNAL.store(forward as i32, Ordering::SeqCst);
    let handler = SigHandler::Handler(handle_sigint);
    // SA_RESTART keeps the read loop and blocking waits going after the handler
    let action = SigAction::new(handler, SaFlags::SA_RESTART, SigSet::empty());
    unsafe {
        sigaction(Signal::SIGINT, &action)?;
    }
    unblock_sigint()?;
    Ok(())
}

fn sigint_set() -> SigSet {
    let mut set = SigSet::empty();
    set.add(Signal::SIGINT);
    set
}

fn unblock_sigint() -> Result<()> {
    sigprocmask(SigmaskHow::SIG_UNBLOCK, Some(&sigint_set()), None)?;
    Ok(())
}

/// Holds SIGINT back while a child is forked and published in the
/// foreground slot. An interrupt arriving meanwhile is delivered when the
/// mask is dropped, by which time the slot names the child.
#[derive(Debug)]
pub struct InterruptMask {
    previous: SigSet,
}

impl InterruptMask {
    pub fn block() -> TshResult<Self> {
        let mut previous = SigSet::empty();
        sigprocmask(SigmaskHow::SIG_BLOCK, Some(&sigint_set()), Some(&mut previous))
            .map_err(|e| TshError::resource("sigprocmask", e))?;
        Ok(InterruptMask { previous })
    }
}

impl Drop for InterruptMask {
    fn drop(&mut self) {
        if let Err(e) = sigprocmask(SigmaskHow::SIG_SETMASK, Some(&self.previous), None) {
            error!("📡 SIGNAL: failed to restore signal mask: {}", e);
        }
    }
}

/// Signals the shell itself ignores.
const SHELL_IGNORED: [Signal; 4] = [
    Signal::SIGQUIT,
    Signal::SIGTSTP,
    Signal::SIGTTIN,
    Signal::SIGTTOU,
];

/// Signals a child gets back at default. SIGTSTP stays ignored: jobs are
/// never stopped, so a stopped foreground child would only hang the shell.
const CHILD_DEFAULT: [Signal; 3] = [Signal::SIGQUIT, Signal::SIGTTIN, Signal::SIGTTOU];

pub(crate) fn ignore_job_control_signals() -> Result<()> {
    let action = SigAction::new(SigHandler::SigIgn, SaFlags::empty(), SigSet::empty());
    for signal in SHELL_IGNORED {
        unsafe {
            sigaction(signal, &action)
                .map_err(|e| anyhow::anyhow!("failed to ignore {:?}: {}", signal, e))?;
        }
    }
    Ok(())
}

/// Restore default dispositions in a freshly forked child, and let SIGINT
/// through if the parent forked it under an `InterruptMask`.
pub(crate) fn reset_child_signals() -> Result<()> {
    let action = SigAction::new(SigHandler::SigDfl, SaFlags::empty(), SigSet::empty());
    unsafe {
        sigaction(Signal::SIGINT, &action)
            .map_err(|e| anyhow::anyhow!("failed to set SIGINT handler: {}", e))?;
        for signal in CHILD_DEFAULT {
            sigaction(signal, &action)
                .map_err(|e| anyhow::anyhow!("failed to set {:?} handler: {}", signal, e))?;
        }
    }
    unblock_sigint()
}

pub(crate) fn send_signal(pid: Pid, signal: Signal) -> Result<()> {
    debug!("📡 SIGNAL: Sending signal {:?} to pid {}", signal, pid);
    match kill(pid, signal) {
        Ok(_) => {
            debug!(
                "📡 SIGNAL: Successfully sent signal {:?} to pid {}",
                signal, pid
            );
            Ok(())
        }
        Err(e) => {
            error!(
                "📡 SIGNAL: Failed to send signal {:?} to pid {}: {}",
                signal, pid, e
            );
            Err(e.into())
        }
    }
}

/// Signal every process in the group led by `pid`. A pid that does not
/// lead a group is signalled on its own.
pub(crate) fn send_signal_to_group(pid: Pid, signal: Signal) -> Result<()> {
    debug!("📡 SIGNAL: Sending signal {:?} to group {}", signal, pid);
    match killpg(pid, signal) {
        Ok(_) => Ok(()),
        Err(Errno::ESRCH) => send_signal(pid, signal),
        Err(e) => {
            error!(
                "📡 SIGNAL: Failed to send signal {:?} to group {}: {}",
                signal, pid, e
            );
            Err(e.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::wait::wait_until_done;
    use crate::process::ProcessState;
    use std::process::Command;

    fn init() {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    }

    fn spawn_sleep() -> Pid {
        let child = Command::new("sleep").arg("30").spawn().unwrap();
        Pid::from_raw(child.id() as i32)
    }

    #[test]
    fn interrupt_with_empty_slot_does_nothing() {
        init();
        let slot = ForegroundSlot::new();
        assert_eq!(slot.interrupt(Signal::SIGINT), InterruptOutcome::Idle);
        assert_eq!(slot.get(), None);
    }

    #[test]
    fn interrupt_signals_live_process_once() {
        init();
        let slot = ForegroundSlot::new();
        let pid = spawn_sleep();
        slot.set(pid);

        assert_eq!(
            slot.interrupt(Signal::SIGTERM),
            InterruptOutcome::Delivered(pid)
        );
        assert_eq!(slot.get(), None);
        // a second interrupt finds nothing to forward to
        assert_eq!(slot.interrupt(Signal::SIGTERM), InterruptOutcome::Idle);

        assert_eq!(
            wait_until_done(pid),
            ProcessState::Completed(1, Some(Signal::SIGTERM))
        );
    }

    #[test]
    fn interrupt_after_exit_just_clears_the_slot() {
        init();
        let slot = ForegroundSlot::new();
        let child = Command::new("true").spawn().unwrap();
        let pid = Pid::from_raw(child.id() as i32);
        // let it become a zombie
        std::thread::sleep(std::time::Duration::from_millis(200));
        slot.set(pid);

        assert_eq!(
            slot.interrupt(Signal::SIGINT),
            InterruptOutcome::AlreadyExited(pid)
        );
        assert_eq!(slot.get(), None);
    }

    #[test]
    fn group_signal_reaches_every_member() {
        use std::os::unix::process::CommandExt;
        init();
        let leader = Command::new("sleep").arg("30").process_group(0).spawn().unwrap();
        let leader = Pid::from_raw(leader.id() as i32);
        let member = Command::new("sleep")
            .arg("30")
            .process_group(leader.as_raw())
            .spawn()
            .unwrap();
        let member = Pid::from_raw(member.id() as i32);

        send_signal_to_group(leader, Signal::SIGKILL).unwrap();
        for pid in [leader, member] {
            assert_eq!(
                wait_until_done(pid),
                ProcessState::Completed(1, Some(Signal::SIGKILL))
            );
        }
    }

    #[test]
    fn group_signal_falls_back_to_the_pid() {
        init();
        let pid = spawn_sleep();
        send_signal_to_group(pid, Signal::SIGKILL).unwrap();
        assert_eq!(
            wait_until_done(pid),
            ProcessState::Completed(1, Some(Signal::SIGKILL))
        );
    }

    #[test]
    fn interrupt_mask_restores_the_previous_mask() {
        let before = SigSet::thread_get_mask().unwrap();
        {
            let _mask = InterruptMask::block().unwrap();
            assert!(SigSet::thread_get_mask().unwrap().contains(Signal::SIGINT));
        }
        assert_eq!(
            SigSet::thread_get_mask().unwrap().contains(Signal::SIGINT),
            before.contains(Signal::SIGINT)
        );
    }

    #[test]
    fn stack_line_truncates_instead_of_growing() {
        let mut line = StackLine::new();
        let long = "x".repeat(200);
        assert!(line.write_str(&long).is_err());
        assert_eq!(line.len, 128);
    }
}
