use super::ShellProxy;
use nix::unistd::{User, getgid, getuid};
use tracing::warn;
use tsh_types::{Context, ExitStatus};

const UNKNOWN: &str = "idk";

/// Prints user name, uid, gid and home directory, one per line.
pub fn command(ctx: &Context, _argv: Vec<String>, _proxy: &mut dyn ShellProxy) -> ExitStatus {
    let uid = getuid();
    let gid = getgid();

    let (name, home) = match User::from_uid(uid) {
        Ok(Some(user)) => (user.name, user.dir.to_string_lossy().to_string()),
        Ok(None) => (UNKNOWN.to_string(), UNKNOWN.to_string()),
        Err(e) => {
            warn!("whoami: user lookup failed for uid {}: {}", uid, e);
            (UNKNOWN.to_string(), UNKNOWN.to_string())
        }
    };

    for line in [name, uid.to_string(), gid.to_string(), home] {
        if let Err(e) = ctx.write_stdout(&line) {
            ctx.write_error(&format!("whoami: {e}")).ok();
            return ExitStatus::ExitedWith(1);
        }
    }
    ExitStatus::ExitedWith(0)
}
