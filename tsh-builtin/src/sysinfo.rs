use super::ShellProxy;
use anyhow::{Context as _, Result};
use chrono::{Local, TimeZone};
use std::path::Path;
use tsh_types::{Context, ExitStatus};

const PROC_ROOT: &str = "/proc";

/// What `sysinfo` prints, read from a procfs mount.
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct SysInfo {
    system: String,
    hostname: String,
    kernel: String,
    boot_time: String,
}

impl SysInfo {
    /// Read every field under `proc`. A file that cannot be read leaves
    /// its field empty and is returned as an error message.
    pub(crate) fn read_from(proc: &Path) -> (Self, Vec<String>) {
        let mut errors = Vec::new();
        let mut field = |res: Result<String>| {
            res.unwrap_or_else(|e| {
                errors.push(format!("{e:#}"));
                String::new()
            })
        };
        let info = SysInfo {
            system: field(first_word(&proc.join("version"))),
            hostname: field(first_word(&proc.join("sys/kernel/hostname"))),
            kernel: field(first_word(&proc.join("sys/kernel/osrelease"))),
            boot_time: field(boot_time(&proc.join("stat"))),
        };
        (info, errors)
    }

    fn lines(&self) -> [String; 5] {
        [
            format!("System: {}", self.system),
            format!("Hostname: {}", self.hostname),
            format!("Kernel: {}", self.kernel),
            format!("Architecture: {}", std::env::consts::ARCH),
            format!("Boot Time: {}", self.boot_time),
        ]
    }
}

fn first_word(path: &Path) -> Result<String> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("open failed on {}", path.display()))?;
    Ok(content
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_string())
}

/// `btime` from `/proc/stat`, as local time.
fn boot_time(path: &Path) -> Result<String> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("open failed on {}", path.display()))?;
    let secs: i64 = content
        .lines()
        .find_map(|line| line.strip_prefix("btime "))
        .and_then(|v| v.trim().parse().ok())
        .with_context(|| format!("no btime in {}", path.display()))?;
    let time = Local
        .timestamp_opt(secs, 0)
        .single()
        .with_context(|| format!("invalid btime {secs}"))?;
    Ok(time.format("%Y-%m-%d %H:%M:%S").to_string())
}

pub fn command(ctx: &Context, argv: Vec<String>, _proxy: &mut dyn ShellProxy) -> ExitStatus {
    if argv.len() > 1 {
        ctx.write_error("sysinfo: invalid arguments").ok();
        return ExitStatus::ExitedWith(1);
    }
    let (info, errors) = SysInfo::read_from(Path::new(PROC_ROOT));
    for err in &errors {
        ctx.write_error(&format!("sysinfo: {err}")).ok();
    }
    for line in info.lines() {
        if ctx.write_stdout(&line).is_err() {
            return ExitStatus::ExitedWith(1);
        }
    }
    ExitStatus::ExitedWith(if errors.is_empty() { 0 } else { 1 })
}
