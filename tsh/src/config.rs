use anyhow::{Context as _, Result};
use indexmap::IndexMap;
use nix::sys::signal::Signal;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;
use tsh_types::APP_NAME;

pub const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Text printed before `> ` when reading a line.
    pub prompt: String,
    /// Program that runs command lines containing wildcards, as `<interpreter> -c <line>`.
    pub interpreter: String,
    /// Signal number forwarded to the foreground process on ctrl-C.
    pub interrupt_signal: i32,
    pub log_file: String,
    pub log_level: String,
    /// Aliases defined at startup, in file order.
    pub alias: IndexMap<String, String>,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            prompt: APP_NAME.to_string(),
            interpreter: "/bin/bash".to_string(),
            interrupt_signal: Signal::SIGINT as i32,
            log_file: format!("./{APP_NAME}-debug.log"),
            log_level: "info".to_string(),
            alias: IndexMap::new(),
        }
    }
}

impl Config {
    pub fn read_file(path: &Path) -> Result<Self> {
        let toml_str = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config: Config = toml::from_str(&toml_str)
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        Ok(config)
    }

    /// `$XDG_CONFIG_HOME/tsh/config.toml`, if it exists.
    pub fn default_path() -> Option<PathBuf> {
        match xdg::BaseDirectories::with_prefix(APP_NAME) {
            Ok(dirs) => dirs.find_config_file(CONFIG_FILE),
            Err(e) => {
                warn!("failed to get xdg directory: {}", e);
                None
            }
        }
    }

    /// Load `path`, or the XDG config when `path` is `None`.
    ///
    /// Anything that goes wrong falls back to the defaults with a warning on
    /// stderr; a missing XDG file is silently the defaults.
    pub fn load(path: Option<&Path>) -> Self {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => match Self::default_path() {
                Some(path) => path,
                None => return Config::default(),
            },
        };
        match Config::read_file(&path) {
            Ok(config) => config,
            Err(e) => {
                warn!("using default config: {:#}", e);
                eprintln!("{APP_NAME}: using default config: {e:#}");
                Config::default()
            }
        }
    }

    /// The configured interrupt signal, or SIGINT if the number is invalid.
    pub fn interrupt_signal(&self) -> Signal {
        Signal::try_from(self.interrupt_signal).unwrap_or_else(|_| {
            warn!(
                "invalid interrupt_signal {}, using SIGINT",
                self.interrupt_signal
            );
            Signal::SIGINT
        })
    }
}
