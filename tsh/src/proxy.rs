use anyhow::{Context as _, Result};
use tracing::debug;
use tsh_builtin::ShellProxy;
use tsh_types::{Context, TshError};

use crate::shell::{Shell, job};

impl ShellProxy for Shell {
    fn exit_shell(&mut self) {
        self.exit();
    }

    fn dispatch(&mut self, ctx: &Context, cmd: &str, argv: Vec<String>) -> Result<()> {
        debug!("dispatch {} {:?}", cmd, argv);
        match cmd {
            "jobs" => job::list_jobs(self, ctx),
            "fg" => job::foreground_job(self, ctx, &argv),
            "kill" => job::signal_job(self, ctx, &argv),
            "quit" => job::kill_all_jobs(self, ctx),
            _ => Err(TshError::usage(cmd, "unknown command").into()),
        }
    }

    fn changepwd(&mut self, path: &str) -> Result<()> {
        let current = std::env::current_dir().context("getcwd failed")?;
        std::env::set_current_dir(path).map_err(|e| anyhow::anyhow!("{path}: {e}"))?;
        self.previous_dir = Some(current.to_string_lossy().to_string());
        Ok(())
    }

    fn previous_dir(&self) -> Option<String> {
        self.previous_dir.clone()
    }

    fn set_prompt(&mut self, prompt: Option<String>) {
        self.prompt = prompt.unwrap_or_else(|| self.default_prompt().to_string());
    }

    fn get_alias(&mut self, name: &str) -> Option<String> {
        self.aliases.get(name).cloned()
    }

    fn list_aliases(&mut self) -> Vec<(String, String)> {
        self.aliases
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    fn set_alias(&mut self, name: String, command: String) {
        self.aliases.insert(name, command);
    }

    fn remove_alias(&mut self, name: &str) -> bool {
        self.aliases.shift_remove(name).is_some()
    }
}
