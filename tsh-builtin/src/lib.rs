use anyhow::Result;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::Mutex;
use tsh_types::{Context, ExitStatus};

// Builtin command modules
mod alias;
pub mod cd;
mod chprompt;
mod fg;
mod jobs;
mod kill;
mod pwd;
mod quit;
mod showpid;
mod sysinfo;
mod unsetenv;
mod whoami;

/// Trait that provides an interface for builtin commands to interact with the shell
/// This allows builtin commands to perform shell operations without direct coupling
pub trait ShellProxy {
    /// Initiates shell exit process
    fn exit_shell(&mut self);

    /// Dispatches a command to the shell's command execution system.
    /// Job control commands (`jobs`, `fg`, `kill`, `quit`) go through here
    /// because they need the job table and the foreground slot.
    fn dispatch(&mut self, ctx: &Context, cmd: &str, argv: Vec<String>) -> Result<()>;

    /// Changes the current working directory and remembers the previous one
    fn changepwd(&mut self, path: &str) -> Result<()>;

    /// Directory the shell was in before the last successful `changepwd`
    fn previous_dir(&self) -> Option<String>;

    /// Replaces the prompt; `None` restores the default
    fn set_prompt(&mut self, prompt: Option<String>);

    fn get_alias(&mut self, name: &str) -> Option<String>;

    /// All aliases in definition order
    fn list_aliases(&mut self) -> Vec<(String, String)>;

    fn set_alias(&mut self, name: String, command: String);

    /// Returns false when no alias with that name exists
    fn remove_alias(&mut self, name: &str) -> bool;
}

/// Type alias for builtin command function signature
/// All builtin commands must conform to this signature
pub type BuiltinCommand =
    fn(ctx: &Context, argv: Vec<String>, proxy: &mut dyn ShellProxy) -> ExitStatus;

/// Global registry of all builtin commands
pub static BUILTIN_COMMAND: Lazy<Mutex<HashMap<&str, BuiltinCommand>>> = Lazy::new(|| {
    let mut builtin = HashMap::new();

    // Core shell commands
    builtin.insert("quit", quit::command as BuiltinCommand);
    builtin.insert("cd", cd::command as BuiltinCommand);
    builtin.insert("pwd", pwd::command as BuiltinCommand);
    builtin.insert("showpid", showpid::command as BuiltinCommand);
    builtin.insert("chprompt", chprompt::command as BuiltinCommand);
    builtin.insert("whoami", whoami::command as BuiltinCommand);
    builtin.insert("sysinfo", sysinfo::command as BuiltinCommand);
    builtin.insert("unsetenv", unsetenv::command as BuiltinCommand);

    // Job control commands
    builtin.insert("jobs", jobs::command as BuiltinCommand);
    builtin.insert("fg", fg::command as BuiltinCommand);
    builtin.insert("kill", kill::command as BuiltinCommand);

    builtin.insert("alias", alias::command as BuiltinCommand);
    builtin.insert("unalias", alias::unalias as BuiltinCommand);

    Mutex::new(builtin)
});

/// Retrieves a builtin command function by name
/// Returns None if the command is not found
pub fn get_command(name: &str) -> Option<BuiltinCommand> {
    if let Ok(builtin) = BUILTIN_COMMAND.lock() {
        builtin.get(name).copied()
    } else {
        None
    }
}

pub fn is_builtin(name: &str) -> bool {
    get_command(name).is_some()
}

/// Shared reporting for builtins that hand their work to the shell.
pub(crate) fn dispatch_to_shell(
    ctx: &Context,
    name: &str,
    argv: Vec<String>,
    proxy: &mut dyn ShellProxy,
) -> ExitStatus {
    match proxy.dispatch(ctx, name, argv) {
        Ok(_) => ExitStatus::ExitedWith(0),
        Err(e) => {
            ctx.write_error(&e.to_string()).ok();
            ExitStatus::ExitedWith(1)
        }
    }
}
