use super::ShellProxy;
use once_cell::sync::Lazy;
use regex::Regex;
use tsh_types::{Context, ExitStatus};

static ALIAS_DEFINITION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([a-zA-Z0-9_]+)='([^']*)'$").expect("valid alias regex"));

/// `alias` lists aliases, `alias name='command'` defines one.
pub fn command(ctx: &Context, argv: Vec<String>, proxy: &mut dyn ShellProxy) -> ExitStatus {
    if argv.len() == 1 {
        for (name, command) in proxy.list_aliases() {
            ctx.write_stdout(&format!("{name}='{command}'")).ok();
        }
        return ExitStatus::ExitedWith(0);
    }

    // The tokenizer split the quoted command on whitespace; put it back.
    let definition = argv[1..].join(" ");
    let Some(caps) = ALIAS_DEFINITION.captures(&definition) else {
        ctx.write_error("alias: invalid alias format").ok();
        return ExitStatus::ExitedWith(1);
    };
    let name = caps[1].to_string();
    let value = caps[2].to_string();

    if super::is_builtin(&name) || proxy.get_alias(&name).is_some() {
        ctx.write_error(&format!(
            "alias: {name} already exists or is a reserved command"
        ))
        .ok();
        return ExitStatus::ExitedWith(1);
    }
    proxy.set_alias(name, value);
    ExitStatus::ExitedWith(0)
}

pub fn unalias(ctx: &Context, argv: Vec<String>, proxy: &mut dyn ShellProxy) -> ExitStatus {
    if argv.len() == 1 {
        ctx.write_error("unalias: not enough arguments").ok();
        return ExitStatus::ExitedWith(1);
    }
    for name in &argv[1..] {
        if !proxy.remove_alias(name) {
            ctx.write_error(&format!("unalias: {name} alias does not exist"))
                .ok();
            return ExitStatus::ExitedWith(1);
        }
    }
    ExitStatus::ExitedWith(0)
}
