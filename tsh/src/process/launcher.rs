use nix::unistd::{ForkResult, Pid, execvp, fork, getpid, setpgid};
use std::ffi::CString;
use std::io::Write;
use tracing::{debug, error};

use super::signal::reset_child_signals;
use tsh_types::{TshError, TshResult};

/// How a command line is turned into an `execvp` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchMode {
    /// Split on whitespace and run `argv[0]` directly.
    Simple,
    /// Hand the whole line to `<interpreter> -c` so it can expand wildcards.
    Complex,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Program {
    pub(crate) mode: LaunchMode,
    pub(crate) path: String,
    pub(crate) argv: Vec<String>,
}

impl Program {
    /// Decide the launch mode once, by scanning for wildcard characters.
    /// Returns `None` for a line with no words.
    pub fn from_command_line(text: &str, interpreter: &str) -> Option<Self> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        if text.contains(['*', '?']) {
            return Some(Program {
                mode: LaunchMode::Complex,
                path: interpreter.to_string(),
                argv: vec![interpreter.to_string(), "-c".to_string(), text.to_string()],
            });
        }
        let argv: Vec<String> = text.split_whitespace().map(|s| s.to_string()).collect();
        Some(Program {
            mode: LaunchMode::Simple,
            path: argv[0].clone(),
            argv,
        })
    }

    fn to_c_strings(&self) -> TshResult<(CString, Vec<CString>)> {
        let nul_error = |_| TshError::usage(&self.path, "argument contains a NUL byte");
        let path = CString::new(self.path.clone()).map_err(nul_error)?;
        let argv = self
            .argv
            .iter()
            .map(|a| CString::new(a.as_str()).map_err(nul_error))
            .collect::<TshResult<Vec<_>>>()?;
        Ok((path, argv))
    }
}

/// Process group a forked child ends up in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessGroup {
    /// Stay in the parent's group, and so on the terminal with it.
    Inherit,
    /// Lead a new group whose id is the child's pid.
    Own,
    /// Join the existing group `pgid`.
    Join(Pid),
}

impl ProcessGroup {
    /// Move `pid` into the group. Called on both sides of the fork so the
    /// group exists whichever side runs first.
    pub(crate) fn apply(self, pid: Pid) {
        let pgid = match self {
            ProcessGroup::Inherit => return,
            ProcessGroup::Own => pid,
            ProcessGroup::Join(pgid) => pgid,
        };
        if let Err(e) = setpgid(pid, pgid) {
            // the child may already have exec'd, which makes setpgid fail
            debug!("🍴 FORK: setpgid({}, {}) failed: {}", pid, pgid, e);
        }
    }
}

/// Fork a child that runs `program` in `group`.
///
/// The child inherits every open descriptor, so any redirection installed
/// by the caller beforehand applies to it.
pub fn spawn(program: &Program, group: ProcessGroup) -> TshResult<Pid> {
    let (path, argv) = program.to_c_strings()?;
    std::io::stdout().flush().ok();

    debug!(
        "🍴 FORK: About to fork {:?} mode:{:?} argv:{:?} group:{:?}",
        program.path, program.mode, program.argv, group
    );
    let pid = unsafe { fork() }.map_err(|e| TshError::resource("fork", e))?;

    match pid {
        ForkResult::Parent { child } => {
            debug!("🍴 FORK: Parent process - child pid: {}", child);
            group.apply(child);
            Ok(child)
        }
        ForkResult::Child => {
            group.apply(getpid());
            let err = exec_prepared(&path, &argv);
            error!("🍴 FORK: Failed to exec {:?} ({})", path, err);
            std::process::exit(1);
        }
    }
}

/// Fork a child leading its own process group that runs `body` and exits
/// with the code it returns. Used to supervise composite commands sent to
/// the background: whatever the body forks stays in that group, so
/// signalling the group reaches all of it.
pub fn fork_with(body: impl FnOnce() -> i32) -> TshResult<Pid> {
    std::io::stdout().flush().ok();
    match unsafe { fork() }.map_err(|e| TshError::resource("fork", e))? {
        ForkResult::Parent { child } => {
            debug!("🍴 FORK: supervisor pid: {}", child);
            ProcessGroup::Own.apply(child);
            Ok(child)
        }
        ForkResult::Child => {
            let pid = getpid();
            ProcessGroup::Own.apply(pid);
            let code = match reset_child_signals() {
                Ok(()) => body(),
                Err(e) => {
                    error!("🍴 FORK: failed to reset signals in {}: {}", pid, e);
                    1
                }
            };
            std::io::stdout().flush().ok();
            std::process::exit(code);
        }
    }
}

/// Replace the current process image with `program`.
///
/// Only called in a child that has already been forked; never returns.
pub fn exec(program: &Program) -> ! {
    match program.to_c_strings() {
        Ok((path, argv)) => {
            let err = exec_prepared(&path, &argv);
            error!("Failed to exec {:?} ({})", path, err);
        }
        Err(err) => error!("Failed to prepare {:?} for exec: {}", program.path, err),
    }
    std::process::exit(1);
}

fn exec_prepared(path: &CString, argv: &[CString]) -> anyhow::Error {
    if let Err(e) = reset_child_signals() {
        return e;
    }
    match execvp(path, argv) {
        Ok(never) => match never {},
        Err(nix::errno::Errno::EACCES) => {
            anyhow::anyhow!("permission denied (EACCES). chmod(1) may help.")
        }
        Err(err) => err.into(),
    }
}
