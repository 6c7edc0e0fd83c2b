use super::ShellProxy;
use tsh_types::{Context, ExitStatus};

/// `unsetenv NAME...`: remove variables from the shell's environment, so
/// programs started afterwards no longer inherit them. Stops at the first
/// name that is not set.
pub fn command(ctx: &Context, argv: Vec<String>, _proxy: &mut dyn ShellProxy) -> ExitStatus {
    if argv.len() < 2 {
        ctx.write_error("unsetenv: not enough arguments").ok();
        return ExitStatus::ExitedWith(1);
    }
    for name in &argv[1..] {
        if name.is_empty() || name.contains(['=', '\0']) || std::env::var_os(name).is_none() {
            ctx.write_error(&format!("unsetenv: {name} does not exist"))
                .ok();
            return ExitStatus::ExitedWith(1);
        }
        // SAFETY: the shell runs a single thread; children only see the
        // environment through fork
        unsafe { std::env::remove_var(name) };
    }
    ExitStatus::ExitedWith(0)
}
