use libc::STDOUT_FILENO;
use nix::fcntl::{FcntlArg, OFlag, fcntl, open};
use nix::sys::stat::Mode;
use nix::unistd::{close, dup2};
use std::io::Write;
use std::os::unix::io::RawFd;
use tracing::{debug, error};

use tsh_types::{TshError, TshResult};

/// Lowest descriptor used for the saved stdout, out of the way of 0-2.
const SAVED_FD_FLOOR: RawFd = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Redirect {
    /// `>`: create or overwrite.
    Truncate(String),
    /// `>>`: create or append.
    Append(String),
}

impl Redirect {
    pub fn path(&self) -> &str {
        match self {
            Redirect::Truncate(path) | Redirect::Append(path) => path,
        }
    }

    fn open_flags(&self) -> OFlag {
        let base = OFlag::O_WRONLY | OFlag::O_CREAT | OFlag::O_CLOEXEC;
        match self {
            Redirect::Truncate(_) => base | OFlag::O_TRUNC,
            Redirect::Append(_) => base | OFlag::O_APPEND,
        }
    }
}

/// Standard output pointed at a file until restored or dropped.
#[derive(Debug)]
pub struct StdoutRedirect {
    saved: Option<RawFd>,
}

impl StdoutRedirect {
    /// Save fd 1 aside, open the target and install it as fd 1.
    ///
    /// On error nothing is left changed and no descriptor is leaked.
    pub fn install(redirect: &Redirect) -> TshResult<Self> {
        std::io::stdout().flush().ok();

        let saved = fcntl(STDOUT_FILENO, FcntlArg::F_DUPFD_CLOEXEC(SAVED_FD_FLOOR))
            .map_err(|e| TshError::resource("dup", e))?;

        let fd = match open(
            redirect.path(),
            redirect.open_flags(),
            Mode::from_bits_truncate(0o666),
        ) {
            Ok(fd) => fd,
            Err(e) => {
                let _ = close(saved);
                return Err(TshError::Open {
                    path: redirect.path().to_string(),
                    source: e,
                });
            }
        };

        let installed = dup2(fd, STDOUT_FILENO);
        let _ = close(fd);
        if let Err(e) = installed {
            let _ = close(saved);
            return Err(TshError::resource("dup2", e));
        }

        debug!(
            "🔀 REDIRECT: stdout -> {:?} (saved stdout as fd {})",
            redirect, saved
        );
        Ok(StdoutRedirect { saved: Some(saved) })
    }

    /// Put the original stdout back and release the saved descriptor.
    pub fn restore(mut self) -> TshResult<()> {
        self.restore_saved()
    }

    fn restore_saved(&mut self) -> TshResult<()> {
        let Some(saved) = self.saved.take() else {
            return Ok(());
        };
        std::io::stdout().flush().ok();
        let restored = dup2(saved, STDOUT_FILENO);
        let _ = close(saved);
        debug!("🔀 REDIRECT: stdout restored from fd {}", saved);
        restored
            .map(|_| ())
            .map_err(|e| TshError::resource("dup2", e))
    }
}

impl Drop for StdoutRedirect {
    fn drop(&mut self) {
        if let Err(e) = self.restore_saved() {
            error!("🔀 REDIRECT: failed to restore stdout: {}", e);
        }
    }
}

/// Run `inner` with stdout sent to `redirect`'s target.
///
/// stdout is restored whatever `inner` returns. A failed restore is logged
/// and reported on stderr but does not replace the inner result.
pub fn with_stdout_redirected<T>(
    redirect: &Redirect,
    inner: impl FnOnce() -> anyhow::Result<T>,
) -> anyhow::Result<T> {
    let guard = StdoutRedirect::install(redirect)?;
    let result = inner();
    if let Err(e) = guard.restore() {
        error!("🔀 REDIRECT: failed to restore stdout: {}", e);
        crate::errors::display_user_error(&e.into());
    }
    result
}
