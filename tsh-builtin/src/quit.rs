use super::ShellProxy;
use tracing::debug;
use tsh_types::{Context, ExitStatus};

/// `quit` leaves the shell; `quit kill` first kills every background job.
pub fn command(ctx: &Context, argv: Vec<String>, proxy: &mut dyn ShellProxy) -> ExitStatus {
    match argv.get(1).map(|s| s.as_str()) {
        None => {
            debug!("quit command called - initiating normal shell exit");
            proxy.exit_shell();
            ExitStatus::ExitedWith(0)
        }
        Some("kill") if argv.len() == 2 => {
            let status = super::dispatch_to_shell(ctx, "quit", argv, proxy);
            proxy.exit_shell();
            status
        }
        Some(_) => {
            ctx.write_error("quit: invalid arguments").ok();
            ExitStatus::ExitedWith(1)
        }
    }
}
