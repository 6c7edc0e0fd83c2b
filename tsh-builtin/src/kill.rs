use crate::ShellProxy;
use nix::sys::signal::Signal;
use tsh_types::{Context, ExitStatus};

pub const COMMAND_NAME: &str = "kill";

/// `kill -<signum> <job-id>`
///
/// Arguments are validated here; the signal itself is delivered by the
/// shell, which owns the job table.
pub fn command(ctx: &Context, argv: Vec<String>, proxy: &mut dyn ShellProxy) -> ExitStatus {
    let (signum, job_id) = match parse_args(&argv) {
        Ok(parsed) => parsed,
        Err(msg) => {
            ctx.write_error(&format!("{COMMAND_NAME}: {msg}")).ok();
            return ExitStatus::ExitedWith(1);
        }
    };

    let argv = vec![
        COMMAND_NAME.to_string(),
        signum.to_string(),
        job_id.to_string(),
    ];
    super::dispatch_to_shell(ctx, COMMAND_NAME, argv, proxy)
}

fn parse_args(argv: &[String]) -> Result<(i32, usize), String> {
    if argv.len() != 3 {
        return Err("invalid arguments".to_string());
    }
    let signum = argv[1]
        .strip_prefix('-')
        .and_then(|s| s.parse::<i32>().ok())
        .ok_or_else(|| "invalid arguments".to_string())?;
    let job_id = argv[2]
        .parse::<usize>()
        .map_err(|_| "invalid arguments".to_string())?;
    if Signal::try_from(signum).is_err() {
        return Err(format!("invalid signal number {signum}"));
    }
    Ok((signum, job_id))
}
