use crate::sys::DEFAULT_KILL_TIMEOUT_MS;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 3000;

/// What one invocation of the binary is asked to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Start,
    Stop,
    Restart,
    ShowVersion,
    ShowHelp,
}

/// How `--kill` finds the instances to terminate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum KillStrategy {
    /// Every process running this executable, recorded or not.
    #[default]
    ByName,
    /// Only the pid named by the marker.
    RecordedPid,
}

/// Settings read from `info-server.toml`. Every key is optional; flags given
/// on the command line win over the file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub port: Option<u16>,
    pub verbose: Option<bool>,
    pub trust_proxy: Option<bool>,
    pub kill_strategy: Option<KillStrategy>,
    /// Milliseconds a terminated instance gets before SIGKILL.
    pub kill_timeout: Option<u64>,
}

/// Immutable snapshot of operator intent, built once per invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfiguration {
    pub action: Action,
    pub port: u16,
    pub verbose: bool,
    pub background: bool,
    pub foreground: bool,
    pub trust_proxy: bool,
    pub kill_strategy: KillStrategy,
    pub kill_timeout: Duration,
}

impl Default for RunConfiguration {
    fn default() -> Self {
        Self {
            action: Action::ShowHelp,
            port: DEFAULT_PORT,
            verbose: false,
            background: false,
            foreground: false,
            trust_proxy: false,
            kill_strategy: KillStrategy::default(),
            kill_timeout: Duration::from_millis(DEFAULT_KILL_TIMEOUT_MS),
        }
    }
}

#[derive(Debug, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("TOML parse error: {0}")]
    TomlParse(String),
    #[error("{0}")]
    IoError(String),
}

/// Loads the config file; a missing file yields the defaults.
pub fn load_config(path: &Path) -> Result<FileConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => parse_config(&content),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(FileConfig::default()),
        Err(e) => Err(ConfigError::IoError(format!("{}: {}", path.display(), e))),
    }
}

pub fn parse_config(content: &str) -> Result<FileConfig, ConfigError> {
    toml::from_str(content).map_err(|e| ConfigError::TomlParse(e.to_string()))
}
