use libc::{STDERR_FILENO, STDIN_FILENO, STDOUT_FILENO};
use nix::unistd::{ForkResult, Pid, close, dup2, fork, getpid, pipe};
use std::io::Write;
use std::os::unix::io::RawFd;
use tracing::{debug, error};

use super::launcher::ProcessGroup;
use super::signal::{ForegroundSlot, InterruptMask, reset_child_signals};
use super::terminal::TerminalHandoff;
use super::wait::wait_until_done;
use tsh_types::{TshError, TshResult};

/// Which output stream of the left stage feeds the pipe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipeStream {
    /// `|`
    Stdout,
    /// `|&`
    Stderr,
}

impl PipeStream {
    fn fd(self) -> RawFd {
        match self {
            PipeStream::Stdout => STDOUT_FILENO,
            PipeStream::Stderr => STDERR_FILENO,
        }
    }
}

/// Where the two stages of a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageGroup {
    /// A new group led by the left stage, joined by the right one. With
    /// `terminal`, the group holds the controlling terminal until both
    /// stages are done.
    Detached { terminal: bool },
    /// The caller's group, so signalling that group reaches both stages.
    Inherited,
}

impl StageGroup {
    fn left(self) -> ProcessGroup {
        match self {
            StageGroup::Detached { .. } => ProcessGroup::Own,
            StageGroup::Inherited => ProcessGroup::Inherit,
        }
    }

    fn right(self, left: Pid) -> ProcessGroup {
        match self {
            StageGroup::Detached { .. } => ProcessGroup::Join(left),
            StageGroup::Inherited => ProcessGroup::Inherit,
        }
    }
}

/// Both ends of a pipe; whatever is still open is closed on drop.
#[derive(Debug)]
struct PipeFds {
    read: Option<RawFd>,
    write: Option<RawFd>,
}

impl PipeFds {
    fn new() -> TshResult<Self> {
        let (read, write) = pipe().map_err(|e| TshError::resource("pipe", e))?;
        debug!("🔗 PIPE: created read={} write={}", read, write);
        Ok(PipeFds {
            read: Some(read),
            write: Some(write),
        })
    }

    fn close_all(&mut self) {
        for fd in [self.read.take(), self.write.take()].into_iter().flatten() {
            if let Err(e) = close(fd) {
                error!("🔗 PIPE: failed to close fd {}: {}", fd, e);
            }
        }
    }
}

impl Drop for PipeFds {
    fn drop(&mut self) {
        self.close_all();
    }
}

/// Child-side plumbing: drop the unused end and move `used` onto `target`.
fn attach_child(unused: RawFd, used: RawFd, target: RawFd) -> anyhow::Result<()> {
    close(unused)?;
    dup2(used, target)?;
    close(used)?;
    reset_child_signals()?;
    Ok(())
}

fn fork_stage<S>(
    state: &mut S,
    stage: impl FnOnce(&mut S) -> i32,
    unused: RawFd,
    used: RawFd,
    target: RawFd,
    group: ProcessGroup,
) -> TshResult<Pid> {
    match unsafe { fork() } {
        Err(e) => Err(TshError::resource("fork", e)),
        Ok(ForkResult::Parent { child }) => {
            group.apply(child);
            Ok(child)
        }
        Ok(ForkResult::Child) => {
            group.apply(getpid());
            let code = match attach_child(unused, used, target) {
                Ok(()) => stage(state),
                Err(e) => {
                    error!("🔗 PIPE: failed to set up pipeline child: {}", e);
                    1
                }
            };
            std::process::exit(code);
        }
    }
}

/// Run `left | right` (or `left |& right`) and wait for both stages.
///
/// Each stage closure runs in its own forked child and returns that
/// child's exit code. Waits are left first, then right, with `slot`
/// naming the child being waited on. SIGINT is held back until the slot
/// has been set. Exit statuses are not reported.
pub fn execute<S>(
    state: &mut S,
    left: impl FnOnce(&mut S) -> i32,
    right: impl FnOnce(&mut S) -> i32,
    stream: PipeStream,
    group: StageGroup,
    slot: &ForegroundSlot,
) -> TshResult<()> {
    std::io::stdout().flush().ok();
    std::io::stderr().flush().ok();

    let mut pipe = PipeFds::new()?;
    let (Some(read_fd), Some(write_fd)) = (pipe.read, pipe.write) else {
        unreachable!("fresh pipe has both ends");
    };

    let mask = InterruptMask::block()?;
    let left_pid = fork_stage(state, left, read_fd, write_fd, stream.fd(), group.left())?;
    debug!("🔗 PIPE: left stage pid {} writes fd {}", left_pid, stream.fd());

    let right_group = group.right(left_pid);
    let right_pid = match fork_stage(state, right, write_fd, read_fd, STDIN_FILENO, right_group) {
        Ok(pid) => pid,
        Err(e) => {
            // the reader is gone; the left stage sees EOF/EPIPE and finishes
            pipe.close_all();
            slot.set(left_pid);
            drop(mask);
            wait_until_done(left_pid);
            slot.clear();
            return Err(e);
        }
    };
    debug!("🔗 PIPE: right stage pid {} reads stdin", right_pid);

    pipe.close_all();

    slot.set(left_pid);
    drop(mask);
    let terminal = match group {
        StageGroup::Detached { terminal: true } => TerminalHandoff::give_to(left_pid),
        _ => None,
    };

    let left_state = wait_until_done(left_pid);
    slot.set(right_pid);
    let right_state = wait_until_done(right_pid);
    slot.clear();
    drop(terminal);

    debug!(
        "🔗 PIPE: complete left:{} ({}) right:{} ({})",
        left_pid, left_state, right_pid, right_state
    );
    Ok(())
}
