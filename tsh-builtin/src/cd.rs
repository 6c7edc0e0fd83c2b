use super::ShellProxy;
use dirs;
use std::path::Path;
use tsh_types::{Context, ExitStatus};

pub fn command(ctx: &Context, argv: Vec<String>, proxy: &mut dyn ShellProxy) -> ExitStatus {
    if argv.len() > 2 {
        ctx.write_error("cd: too many arguments").ok();
        return ExitStatus::ExitedWith(1);
    }

    let dir = match argv.get(1).map(|s| s.as_str()) {
        Some("-") => match proxy.previous_dir() {
            Some(prev) => prev,
            None => {
                ctx.write_error("cd: OLDPWD not set").ok();
                return ExitStatus::ExitedWith(1);
            }
        },
        Some(dir) if dir.starts_with('/') => dir.to_string(),
        Some(dir) if dir.starts_with('~') => shellexpand::tilde(dir).to_string(),
        Some(dir) => {
            let current_dir = match std::env::current_dir() {
                Ok(dir) => dir,
                Err(err) => {
                    ctx.write_error(&format!("getcwd failed: {err}")).ok();
                    return ExitStatus::ExitedWith(1);
                }
            };
            Path::new(&current_dir).join(dir).to_string_lossy().into_owned()
        }
        None => {
            if let Some(home_dir) = dirs::home_dir() {
                home_dir.to_string_lossy().into_owned()
            } else {
                String::from("/")
            }
        }
    };

    match proxy.changepwd(&dir) {
        Ok(_) => ExitStatus::ExitedWith(0),
        Err(err) => {
            ctx.write_error(&format!("chdir failed: {err}")).ok();
            ExitStatus::ExitedWith(1)
        }
    }
}
