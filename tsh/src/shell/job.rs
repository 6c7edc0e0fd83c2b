use anyhow::Result;
use nix::sys::signal::Signal;
use tracing::debug;
use tsh_types::{APP_NAME, Context, TshError};

use crate::process::Job;
use crate::process::signal::send_signal_to_group;
use crate::process::terminal::TerminalHandoff;
use crate::shell::Shell;

/// `jobs`: one `[<id>] <cmd>` line per live job.
pub fn list_jobs(shell: &mut Shell, ctx: &Context) -> Result<()> {
    for job in shell.jobs.jobs() {
        ctx.write_stdout(&job.to_string())?;
    }
    Ok(())
}

/// `fg [job-id]`: print the job, then wait for it in the foreground. On a
/// terminal the job's group holds the terminal while it is waited on.
pub fn foreground_job(shell: &mut Shell, ctx: &Context, argv: &[String]) -> Result<()> {
    let job = match argv {
        [_] => shell
            .jobs
            .last_job()
            .cloned()
            .ok_or_else(|| TshError::usage("fg", "jobs list is empty"))?,
        [_, id] => {
            let job_id = parse_job_id("fg", id)?;
            lookup(shell, "fg", job_id)?
        }
        _ => return Err(TshError::usage("fg", "invalid arguments").into()),
    };

    ctx.write_stdout(&format!("{} {}", job.cmd, job.pid))?;
    let terminal = if ctx.interactive {
        TerminalHandoff::give_to(job.pid)
    } else {
        None
    };
    let state = shell.wait_foreground(job.pid);
    drop(terminal);
    shell.jobs.remove_job_by_id(job.job_id);
    debug!("fg: job {} finished: {}", job.job_id, state);
    Ok(())
}

/// `kill <signum> <job-id>`, arguments already validated by the builtin.
/// The signal goes to the job's whole process group.
pub fn signal_job(shell: &mut Shell, ctx: &Context, argv: &[String]) -> Result<()> {
    let [_, signum, id] = argv else {
        return Err(TshError::usage("kill", "invalid arguments").into());
    };
    let signum: i32 = signum
        .parse()
        .map_err(|_| TshError::usage("kill", "invalid arguments"))?;
    let signal = Signal::try_from(signum)
        .map_err(|_| TshError::usage("kill", format!("invalid signal number {signum}")))?;
    let job_id = parse_job_id("kill", id)?;
    let job = lookup(shell, "kill", job_id)?;

    send_signal_to_group(job.pid, signal).map_err(|_| TshError::usage("kill", "kill failed"))?;
    ctx.write_stdout(&format!("signal number {} was sent to pid {}", signum, job.pid))?;
    Ok(())
}

/// `quit kill`: report and SIGKILL every live job.
pub fn kill_all_jobs(shell: &mut Shell, ctx: &Context) -> Result<()> {
    let jobs: Vec<Job> = shell.jobs.jobs().into_iter().cloned().collect();
    ctx.write_stdout(&format!(
        "{APP_NAME}: sending SIGKILL signal to {} jobs:",
        jobs.len()
    ))?;
    for job in &jobs {
        ctx.write_stdout(&format!("{}: {}", job.pid, job.cmd))?;
    }
    let killed = shell.jobs.terminate_all();
    debug!("quit: killed {} of {} jobs", killed, jobs.len());
    Ok(())
}

fn parse_job_id(command: &str, arg: &str) -> Result<usize, TshError> {
    arg.parse::<usize>()
        .map_err(|_| TshError::usage(command, "invalid arguments"))
}

fn lookup(shell: &mut Shell, command: &str, job_id: usize) -> Result<Job, TshError> {
    shell
        .jobs
        .get_job_by_id(job_id)
        .cloned()
        .ok_or_else(|| TshError::usage(command, format!("job-id {job_id} does not exist")))
}
