use anyhow::Result;
use clap::Parser;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::debug;
use tracing_subscriber::EnvFilter;
use tsh_types::{APP_NAME, Context, ExitStatus};

pub mod config;
pub mod errors;
pub mod process;
pub mod proxy;
pub mod shell;

use crate::config::Config;
use crate::errors::display_user_error;
use crate::shell::Shell;

/// Environment variable holding an `EnvFilter` directive that overrides
/// the configured log level.
pub const LOG_ENV: &str = "TSH_LOG";

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Run a single command line and exit with its status
    #[arg(short, long)]
    pub command: Option<String>,

    /// Config file to use instead of $XDG_CONFIG_HOME/tsh/config.toml
    #[arg(long)]
    pub config: Option<PathBuf>,
}

pub fn lib_main() -> ExitCode {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref());

    if let Err(err) = init_tracing(&config) {
        eprintln!("Failed to initialize tracing: {err}");
        return ExitCode::FAILURE;
    }
    setup_panic_handler(config.log_file.clone());

    let mut shell = Shell::new(config);
    if let Err(err) = shell.set_signals() {
        display_user_error(&err.context("failed to set ctrl-C handler"));
    }
    let ctx = shell.context();

    if let Some(command) = cli.command.as_deref() {
        execute_command(&mut shell, &ctx, command)
    } else {
        run_interactive(&mut shell, &ctx)
    }
}

pub fn init_tracing(config: &Config) -> Result<()> {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let log_file = Arc::new(std::fs::File::create(&config.log_file)?);
    tracing_subscriber::fmt()
        .with_ansi(false)
        .with_env_filter(filter)
        .with_file(true)
        .with_line_number(true)
        .with_writer(log_file)
        .try_init()
        .map_err(|e| anyhow::anyhow!("{e}"))?;
    Ok(())
}

pub fn setup_panic_handler(log_file: String) {
    std::panic::set_hook(Box::new(move |panic_info| {
        let thread = std::thread::current();
        let thread_name = thread.name().unwrap_or("unnamed");

        let payload = panic_info.payload().downcast_ref::<&str>().map_or_else(
            || {
                if let Some(s) = panic_info.payload().downcast_ref::<String>() {
                    s.clone()
                } else {
                    "Unknown panic payload".to_string()
                }
            },
            |s| (*s).to_string(),
        );

        let location = panic_info.location().map_or_else(
            || "Unknown location".to_string(),
            |location| {
                format!(
                    "{}:{}:{}",
                    location.file(),
                    location.line(),
                    location.column()
                )
            },
        );

        let backtrace = std::backtrace::Backtrace::capture();
        let backtrace_str = match backtrace.status() {
            std::backtrace::BacktraceStatus::Captured => format!("\nBacktrace:\n{backtrace}"),
            std::backtrace::BacktraceStatus::Disabled => {
                "\nBacktrace: disabled (set RUST_BACKTRACE=1 to enable)".to_string()
            }
            _ => "\nBacktrace: unsupported".to_string(),
        };

        // tracing may not be initialized, write the file directly
        let timestamp = chrono::Utc::now().format("%Y-%m-%d %H:%M:%S%.3f UTC");
        let panic_log = format!(
            "\n=== PANIC OCCURRED ===\n\
            Timestamp: {timestamp}\n\
            Thread: {thread_name}\n\
            Location: {location}\n\
            Message: {payload}{backtrace_str}\n\
            ======================\n"
        );
        if let Ok(mut file) = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
        {
            let _ = writeln!(file, "{panic_log}");
            let _ = file.flush();
        }

        tracing::error!("PANIC OCCURRED: {payload} at {location}");

        eprintln!("\n=== {APP_NAME} PANIC ===");
        eprintln!("Message: {payload}");
        eprintln!("Location: {location}");
        eprintln!("See {log_file} for details");
    }));
}

fn exit_code(status: ExitStatus) -> ExitCode {
    match status {
        ExitStatus::ExitedWith(code) => ExitCode::from(code.clamp(0, 255) as u8),
        ExitStatus::Running(_) => ExitCode::SUCCESS,
    }
}

pub fn execute_command(shell: &mut Shell, ctx: &Context, command: &str) -> ExitCode {
    debug!("run command mode {:?}", command);
    match shell.eval_str(ctx, command) {
        Ok(status) => {
            debug!("command mode {:?} finished: {:?}", command, status);
            exit_code(status)
        }
        Err(err) => {
            display_user_error(&err);
            ExitCode::FAILURE
        }
    }
}

/// The read loop: reclaim finished jobs, print the prompt, read a line,
/// evaluate it. Ends on `quit` or end of input.
pub fn run_interactive(shell: &mut Shell, ctx: &Context) -> ExitCode {
    debug!("start shell (interactive: {})", ctx.interactive);
    let stdin = io::stdin();
    let mut line = String::new();

    loop {
        shell.reclaim_jobs();
        print!("{}> ", shell.prompt());
        io::stdout().flush().ok();

        line.clear();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => {
                debug!("end of input");
                break;
            }
            Ok(_) => {}
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => {
                eprintln!("{APP_NAME} error: failed to read input: {err}");
                return ExitCode::FAILURE;
            }
        }

        if let Err(err) = shell.eval_str(ctx, &line) {
            display_user_error(&err);
        }
        if shell.is_exited() {
            debug!("quit requested");
            break;
        }
    }
    ExitCode::SUCCESS
}
