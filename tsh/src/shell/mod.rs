use anyhow::Result;
use indexmap::IndexMap;
use nix::unistd::{Pid, getpid};
use tracing::debug;
use tsh_types::{Context, ExitStatus, TshResult};

use crate::config::Config;
use crate::process::signal::{ignore_job_control_signals, install_interrupt_handler};
use crate::process::wait::wait_until_done;
use crate::process::{
    InterruptMask, JobTable, ProcessGroup, ProcessState, Program, foreground, launcher,
};

pub mod command;
pub mod job;
pub mod parse;

pub use command::{Command, CommandKind};

pub struct Shell {
    pub pid: Pid,
    pub exited: Option<ExitStatus>,
    pub(crate) config: Config,
    pub(crate) prompt: String,
    pub(crate) aliases: IndexMap<String, String>,
    pub(crate) jobs: JobTable,
    pub(crate) previous_dir: Option<String>,
}

impl std::fmt::Debug for Shell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Shell")
            .field("pid", &self.pid)
            .field("jobs", &self.jobs)
            .finish()
    }
}

impl Shell {
    pub fn new(config: Config) -> Self {
        Shell {
            pid: getpid(),
            exited: None,
            prompt: config.prompt.clone(),
            aliases: config.alias.clone(),
            config,
            jobs: JobTable::new(),
            previous_dir: None,
        }
    }

    pub fn set_signals(&mut self) -> Result<()> {
        ignore_job_control_signals()?;
        install_interrupt_handler(self.config.interrupt_signal())?;
        Ok(())
    }

    pub fn context(&self) -> Context {
        Context::new(self.pid)
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub(crate) fn default_prompt(&self) -> &str {
        &self.config.prompt
    }

    pub fn exit(&mut self) {
        self.exited = Some(ExitStatus::ExitedWith(0));
    }

    pub fn is_exited(&self) -> bool {
        self.exited.is_some()
    }

    /// Drop finished background jobs; run before every prompt.
    pub fn reclaim_jobs(&mut self) {
        for job in self.jobs.reclaim() {
            debug!("reclaimed job [{}] {} ({})", job.job_id, job.cmd, job.pid);
        }
    }

    /// Replace the first word with its alias, keeping the remaining words.
    pub fn expand_alias(&self, line: &str) -> String {
        let line = line.trim();
        let (first, rest) = match line.split_once(char::is_whitespace) {
            Some((first, rest)) => (first, rest.trim_start()),
            None => (line, ""),
        };
        match self.aliases.get(first) {
            Some(expansion) if rest.is_empty() => expansion.clone(),
            Some(expansion) => format!("{expansion} {rest}"),
            None => line.to_string(),
        }
    }

    /// True in a forked child running shell code: a pipeline stage or a
    /// background supervisor. Such a copy does not own the job table.
    pub(crate) fn is_forked_copy(&self) -> bool {
        getpid() != self.pid
    }

    /// Wait for `pid` with the foreground slot pointing at it.
    pub(crate) fn wait_foreground(&mut self, pid: Pid) -> ProcessState {
        let slot = foreground();
        slot.set(pid);
        let state = wait_until_done(pid);
        slot.clear();
        state
    }

    /// Run `program` in the foreground and wait for it.
    ///
    /// The child stays in the caller's process group, so it shares the
    /// terminal with the shell. SIGINT is held back from the fork until
    /// the slot names the child, so an early ctrl-C still reaches it.
    pub(crate) fn run_foreground_program(
        &mut self,
        program: &Program,
    ) -> TshResult<(Pid, ProcessState)> {
        let slot = foreground();
        let mask = InterruptMask::block()?;
        let pid = launcher::spawn(program, ProcessGroup::Inherit)?;
        slot.set(pid);
        drop(mask);

        let state = wait_until_done(pid);
        slot.clear();
        Ok((pid, state))
    }

    /// Evaluate one input line.
    ///
    /// A blank line does nothing. Errors are returned for the caller to
    /// report; none of them leave the shell unusable.
    pub fn eval_str(&mut self, ctx: &Context, line: &str) -> Result<ExitStatus> {
        let line = self.expand_alias(line);
        let Some(mut command) = parse::parse_line(&line, &self.config.interpreter)? else {
            return Ok(ExitStatus::ExitedWith(0));
        };
        debug!("eval {:?}", command);
        command.execute(ctx, self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::LaunchMode;
    use nix::unistd::getpgrp;

    fn shell_with_aliases(pairs: &[(&str, &str)]) -> Shell {
        let mut config = Config::default();
        for (name, cmd) in pairs {
            config.alias.insert(name.to_string(), cmd.to_string());
        }
        Shell::new(config)
    }

    #[test]
    fn alias_expands_first_word_only() {
        let shell = shell_with_aliases(&[("ll", "ls -al"), ("x", "echo")]);
        assert_eq!(shell.expand_alias("ll /tmp"), "ls -al /tmp");
        assert_eq!(shell.expand_alias("  ll  "), "ls -al");
        assert_eq!(shell.expand_alias("echo ll"), "echo ll");
        assert_eq!(shell.expand_alias("ll &"), "ls -al &");
    }

    #[test]
    fn blank_line_is_a_no_op() {
        let mut shell = Shell::new(Config::default());
        let ctx = shell.context();
        assert_eq!(
            shell.eval_str(&ctx, "   ").unwrap(),
            ExitStatus::ExitedWith(0)
        );
    }

    #[test]
    fn external_exit_code_is_returned() {
        let mut shell = Shell::new(Config::default());
        let ctx = shell.context();
        assert_eq!(
            shell.eval_str(&ctx, "sh -c exit").unwrap(),
            ExitStatus::ExitedWith(0)
        );
        assert_eq!(
            shell.eval_str(&ctx, "false").unwrap(),
            ExitStatus::ExitedWith(1)
        );
    }

    #[test]
    fn background_command_becomes_a_job() {
        let mut shell = Shell::new(Config::default());
        let ctx = shell.context();
        let status = shell.eval_str(&ctx, "sleep 30 &").unwrap();
        assert!(matches!(status, ExitStatus::Running(_)));

        let jobs: Vec<String> = shell.jobs.jobs().iter().map(|j| j.to_string()).collect();
        assert_eq!(jobs, vec!["[1] sleep 30"]);
        assert_eq!(shell.jobs.terminate_all(), 1);
    }

    #[test]
    fn foreground_program_shares_our_process_group() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let out = dir.path().join("pgid");
        let mut shell = Shell::new(Config::default());
        // field 5 of /proc/<pid>/stat is the process group id
        let script = format!("cut -d' ' -f5 /proc/$$/stat > {}", out.display());
        let program = Program {
            mode: LaunchMode::Complex,
            path: "/bin/sh".to_string(),
            argv: vec!["/bin/sh".to_string(), "-c".to_string(), script],
        };
        let (_, state) = shell.run_foreground_program(&program)?;
        assert_eq!(state, ProcessState::Completed(0, None));
        let pgid: i32 = std::fs::read_to_string(&out)?.trim().parse()?;
        assert_eq!(pgid, getpgrp().as_raw());
        Ok(())
    }

    #[test]
    fn background_job_leads_its_own_group() {
        let mut shell = Shell::new(Config::default());
        let ctx = shell.context();
        let ExitStatus::Running(pid) = shell.eval_str(&ctx, "sleep 30 &").unwrap() else {
            panic!("expected a background job");
        };
        assert_eq!(nix::unistd::getpgid(Some(pid)).unwrap(), pid);
        assert_eq!(shell.jobs.terminate_all(), 1);
    }

    #[test]
    fn job_control_is_refused_inside_a_forked_copy() {
        let mut shell = Shell::new(Config::default());
        let ctx = shell.context();
        // a background supervisor runs builtins in a forked copy of the shell
        let pid = launcher::fork_with(|| match run_in_copy(&mut shell, &ctx, "fg 1") {
            ExitStatus::ExitedWith(1) => 0,
            _ => 2,
        })
        .unwrap();
        assert_eq!(wait_until_done(pid), ProcessState::Completed(0, None));
    }

    fn run_in_copy(shell: &mut Shell, ctx: &Context, line: &str) -> ExitStatus {
        let mut ctx = ctx.clone();
        if let Ok(devnull) = std::fs::OpenOptions::new().write(true).open("/dev/null") {
            ctx.errfile = std::os::unix::io::IntoRawFd::into_raw_fd(devnull);
        }
        shell.eval_str(&ctx, line).unwrap_or(ExitStatus::ExitedWith(3))
    }

    #[test]
    fn syntax_errors_are_returned() {
        let mut shell = Shell::new(Config::default());
        let ctx = shell.context();
        let err = shell.eval_str(&ctx, "ls |").unwrap_err();
        assert!(err.to_string().starts_with("syntax error"), "{err}");
    }
}
