use super::ShellProxy;
use tsh_types::{APP_NAME, Context, ExitStatus};

pub fn command(ctx: &Context, argv: Vec<String>, _proxy: &mut dyn ShellProxy) -> ExitStatus {
    if argv.len() > 1 {
        ctx.write_error("showpid: invalid arguments").ok();
        return ExitStatus::ExitedWith(1);
    }
    ctx.write_stdout(&format!("{APP_NAME} pid is {}", ctx.shell_pid))
        .ok();
    ExitStatus::ExitedWith(0)
}
