use anyhow::Result;
use libc::{STDERR_FILENO, STDIN_FILENO, STDOUT_FILENO};
use nix::errno::Errno;
use nix::unistd::{Pid, isatty};
use std::fmt::Debug;
use std::fs::File;
use std::io::Write;
use std::mem;
use std::os::unix::io::FromRawFd;
use std::os::unix::io::RawFd;
use thiserror::Error;
use tracing::debug;

pub const APP_NAME: &str = "tsh";

/// Errors raised by the process and job-control engine.
///
/// Every variant is recoverable: the interpreter reports it and reads the
/// next line.
#[derive(Error, Debug)]
pub enum TshError {
    /// A system resource could not be obtained (fork, pipe, dup, ...).
    #[error("{call} failed: {source}")]
    Resource {
        call: &'static str,
        #[source]
        source: Errno,
    },

    #[error("open failed: {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: Errno,
    },

    /// A line that cannot be classified into a command.
    #[error("syntax error: {0}")]
    Syntax(String),

    /// Bad arguments or references to things that do not exist.
    #[error("{command}: {message}")]
    Usage { command: String, message: String },

    #[error("IO operation failed: {0}")]
    Io(#[from] std::io::Error),
}

impl TshError {
    pub fn resource(call: &'static str, source: Errno) -> Self {
        TshError::Resource { call, source }
    }

    pub fn usage(command: &str, message: impl Into<String>) -> Self {
        TshError::Usage {
            command: command.to_string(),
            message: message.into(),
        }
    }
}

pub type TshResult<T> = std::result::Result<T, TshError>;

#[derive(Clone)]
pub struct Context {
    pub shell_pid: Pid,
    /// Standard input is a terminal the shell can hand to foreground work.
    pub interactive: bool,
    pub outfile: RawFd,
    pub errfile: RawFd,
}

impl Context {
    pub fn new(shell_pid: Pid) -> Self {
        let interactive = isatty(STDIN_FILENO).unwrap_or(false);
        debug!("Terminal detection for stdin: {}", interactive);

        Context {
            shell_pid,
            interactive,
            outfile: STDOUT_FILENO,
            errfile: STDERR_FILENO,
        }
    }
}

impl Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::result::Result<(), std::fmt::Error> {
        f.debug_struct("Context")
            .field("shell_pid", &self.shell_pid)
            .field("interactive", &self.interactive)
            .field("outfile", &self.outfile)
            .field("errfile", &self.errfile)
            .finish()
    }
}

impl Context {
    // Writes go straight to the descriptor so that a redirected fd 1 is
    // honoured without going through Rust's buffered stdout.
    pub fn write_stdout(&self, msg: &str) -> Result<()> {
        let mut file = unsafe { File::from_raw_fd(self.outfile) };
        let res = writeln!(&mut file, "{msg}");
        mem::forget(file);
        res?;
        Ok(())
    }

    pub fn write_stderr(&self, msg: &str) -> Result<()> {
        let mut file = unsafe { File::from_raw_fd(self.errfile) };
        let res = writeln!(&mut file, "{msg}");
        mem::forget(file);
        res?;
        Ok(())
    }

    /// Report a user-visible error in the shell's `<app> error: ...` format.
    pub fn write_error(&self, msg: &str) -> Result<()> {
        self.write_stderr(&format!("{APP_NAME} error: {msg}"))
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ExitStatus {
    ExitedWith(i32),
    Running(Pid),
}
