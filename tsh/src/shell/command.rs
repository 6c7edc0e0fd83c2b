use anyhow::Result;
use nix::unistd::Pid;
use tracing::debug;
use tsh_types::{Context, ExitStatus, TshError};

use crate::errors::display_user_error;
use crate::process::redirect::with_stdout_redirected;
use crate::process::{
    PipeStream, ProcessGroup, ProcessState, Program, Redirect, StageGroup, foreground, launcher,
    pipeline,
};
use crate::shell::Shell;

#[derive(Debug)]
pub enum CommandKind {
    /// Runs inside the shell process.
    Builtin { argv: Vec<String> },
    External { program: Program },
    Pipeline {
        left: Box<Command>,
        right: Box<Command>,
        stream: PipeStream,
    },
    Redirection {
        inner: Box<Command>,
        redirect: Redirect,
    },
}

/// A classified command line.
#[derive(Debug)]
pub struct Command {
    /// The line this command was built from, without any trailing `&`.
    pub text: String,
    pub kind: CommandKind,
    pub background: bool,
    /// Set once a child process has been created for this command.
    pub pid: Option<Pid>,
}

impl Command {
    pub fn new(text: impl Into<String>, kind: CommandKind) -> Self {
        Command {
            text: text.into(),
            kind,
            background: false,
            pid: None,
        }
    }

    pub fn is_builtin(&self) -> bool {
        matches!(self.kind, CommandKind::Builtin { .. })
    }

    /// Run the command. Builtins ignore `background`.
    pub fn execute(&mut self, ctx: &Context, shell: &mut Shell) -> Result<ExitStatus> {
        if self.background && !self.is_builtin() {
            self.launch_background(ctx, shell)
        } else {
            self.run_foreground(ctx, shell)
        }
    }

    fn run_foreground(&mut self, ctx: &Context, shell: &mut Shell) -> Result<ExitStatus> {
        match &mut self.kind {
            CommandKind::Builtin { argv } => Ok(run_builtin(ctx, argv.clone(), shell)),
            CommandKind::External { program } => {
                let (pid, state) = shell.run_foreground_program(program)?;
                self.pid = Some(pid);
                debug!("foreground {} ({}) finished: {}", self.text, pid, state);
                Ok(ExitStatus::ExitedWith(exit_code(state)))
            }
            CommandKind::Pipeline {
                left,
                right,
                stream,
            } => {
                let stream = *stream;
                // a copy of the shell (supervisor or outer stage) keeps the
                // stages in its own group so signalling that group reaches them
                let group = if shell.is_forked_copy() {
                    StageGroup::Inherited
                } else {
                    StageGroup::Detached {
                        terminal: ctx.interactive,
                    }
                };
                pipeline::execute(
                    shell,
                    |shell| left.run_in_child(ctx, shell),
                    |shell| right.run_in_child(ctx, shell),
                    stream,
                    group,
                    foreground(),
                )?;
                Ok(ExitStatus::ExitedWith(0))
            }
            CommandKind::Redirection { inner, redirect } => {
                with_stdout_redirected(redirect, || inner.run_foreground(ctx, shell))
            }
        }
    }

    /// Body of a forked child: run to completion and hand back an exit code.
    /// External programs replace the child instead of returning.
    fn run_in_child(&mut self, ctx: &Context, shell: &mut Shell) -> i32 {
        if let CommandKind::External { program } = &self.kind {
            launcher::exec(program);
        }
        match self.run_foreground(ctx, shell) {
            Ok(ExitStatus::ExitedWith(code)) => code,
            Ok(ExitStatus::Running(_)) => 0,
            Err(e) => {
                display_user_error(&e);
                1
            }
        }
    }

    /// Start the command without waiting and record it as a job.
    ///
    /// The job leads its own process group. A composite command gets a
    /// forked supervisor that runs it synchronously; its children stay in
    /// the supervisor's group and the supervisor's pid is what the job
    /// table tracks.
    fn launch_background(&mut self, ctx: &Context, shell: &mut Shell) -> Result<ExitStatus> {
        let pid = if let CommandKind::External { program } = &self.kind {
            launcher::spawn(program, ProcessGroup::Own)?
        } else {
            launcher::fork_with(|| self.run_in_child(ctx, shell))?
        };
        self.pid = Some(pid);
        let job_id = shell.jobs.add_job(pid, self.text.clone());
        debug!("background job [{}] {} pid {}", job_id, self.text, pid);
        Ok(ExitStatus::Running(pid))
    }
}

/// Builtins that act on the job table, which only the shell process owns.
const JOB_CONTROL_BUILTINS: [&str; 3] = ["fg", "kill", "quit"];

fn run_builtin(ctx: &Context, argv: Vec<String>, shell: &mut Shell) -> ExitStatus {
    let Some(name) = argv.first() else {
        return ExitStatus::ExitedWith(127);
    };
    if shell.is_forked_copy() && JOB_CONTROL_BUILTINS.contains(&name.as_str()) {
        let err = TshError::usage(name, "not available in a pipeline or background command");
        ctx.write_error(&err.to_string()).ok();
        return ExitStatus::ExitedWith(1);
    }
    match tsh_builtin::get_command(name) {
        Some(builtin) => builtin(ctx, argv, shell),
        None => ExitStatus::ExitedWith(127),
    }
}

fn exit_code(state: ProcessState) -> i32 {
    match state {
        ProcessState::Completed(code, _) => code as i32,
        ProcessState::Running => 0,
    }
}
