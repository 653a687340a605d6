use crate::signals::{parse_signal, status_signal, MonitorError};
use nix::sys::signal::Signal;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Top-level configuration loaded from iter8.toml.
#[derive(Debug, Deserialize, Default, Clone, PartialEq)]
#[serde(default)]
pub struct Iter8Config {
    pub monitor: MonitorConfig,
    pub tap: TapConfig,
    pub take: TakeConfig,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct MonitorConfig {
    /// Signal name; `None` means the platform status signal.
    pub signal: Option<String>,
    pub start: usize,
    pub enabled: bool,
}

#[derive(Debug, Deserialize, Default, Clone, PartialEq)]
#[serde(default)]
pub struct TapConfig {
    /// Report every N items read; 0 disables.
    pub every: u64,
}

#[derive(Debug, Deserialize, Default, Clone, PartialEq)]
#[serde(default)]
pub struct TakeConfig {
    /// May be negative in the file; rejected when applied.
    pub limit: Option<i64>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            signal: None,
            start: 0,
            enabled: true,
        }
    }
}

impl MonitorConfig {
    /// Resolve the configured signal name, or the platform default.
    pub fn resolve_signal(&self) -> Result<Signal, MonitorError> {
        match &self.signal {
            Some(name) => parse_signal(name),
            None => status_signal(),
        }
    }
}

/// Errors from loading a config file.
#[derive(Debug)]
pub enum ConfigError {
    /// The file exists but could not be read.
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    /// The file is not valid iter8 TOML.
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Read { path, source } => {
                write!(f, "failed to read {}: {}", path.display(), source)
            }
            ConfigError::Parse { path, source } => {
                write!(f, "failed to parse {}: {}", path.display(), source)
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Read { source, .. } => Some(source),
            ConfigError::Parse { source, .. } => Some(source),
        }
    }
}

/// Load config from `path`; a missing file yields the defaults.
pub fn load_config(path: &Path) -> Result<Iter8Config, ConfigError> {
    let contents = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Iter8Config::default());
        }
        Err(e) => {
            return Err(ConfigError::Read {
                path: path.to_path_buf(),
                source: e,
            })
        }
    };

    toml::from_str(&contents).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        source: e,
    })
}
