use super::ShellProxy;
use tsh_types::{Context, ExitStatus};

pub fn command(ctx: &Context, argv: Vec<String>, _proxy: &mut dyn ShellProxy) -> ExitStatus {
    if argv.len() > 1 {
        ctx.write_error("pwd: invalid arguments").ok();
        return ExitStatus::ExitedWith(1);
    }
    match std::env::current_dir() {
        Ok(dir) => {
            ctx.write_stdout(&dir.to_string_lossy()).ok();
            ExitStatus::ExitedWith(0)
        }
        Err(err) => {
            ctx.write_error(&format!("getcwd failed: {err}")).ok();
            ExitStatus::ExitedWith(1)
        }
    }
}
