use super::ShellProxy;
use tsh_types::{Context, ExitStatus};

pub fn command(ctx: &Context, argv: Vec<String>, proxy: &mut dyn ShellProxy) -> ExitStatus {
    super::dispatch_to_shell(ctx, "fg", argv, proxy)
}
