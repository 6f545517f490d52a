use serde::Deserialize;
use std::num::ParseIntError;
use std::path::{Path, PathBuf};

/// Environment variable that overrides the listening port.
pub const PORT_ENV: &str = "PORT";

/// Top-level configuration loaded from botshell.toml.
#[derive(Debug, Deserialize, Default, Clone, PartialEq)]
#[serde(default)]
pub struct ShellConfig {
    pub server: ServerConfig,
    pub bot: BotConfig,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
}

/// The supervised executable. The argument list is fixed once loaded.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct BotConfig {
    pub command: String,
    pub args: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: 5000,
        }
    }
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            command: "python3".to_string(),
            args: vec!["main.py".to_string()],
        }
    }
}

/// Errors that can occur while resolving configuration.
#[derive(Debug)]
pub enum ConfigError {
    /// The config file exists but could not be read.
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    /// The config file is not valid TOML for `ShellConfig`.
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    /// `PORT` is set but is not a base-10 port number.
    InvalidPort {
        value: String,
        source: ParseIntError,
    },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Read { path, source } => {
                write!(f, "failed to read config {}: {}", path.display(), source)
            }
            ConfigError::Parse { path, source } => {
                write!(f, "failed to parse config {}: {}", path.display(), source)
            }
            ConfigError::InvalidPort { value, source } => {
                write!(f, "invalid {PORT_ENV} value {value:?}: {source}")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Read { source, .. } => Some(source),
            ConfigError::Parse { source, .. } => Some(source),
            ConfigError::InvalidPort { source, .. } => Some(source),
        }
    }
}

impl ShellConfig {
    /// Load config from `path`. A missing file means all defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no config file, using defaults");
                return Ok(Self::default());
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

    /// Overlay environment settings. Only `PORT` is consulted.
    ///
    /// Unset or empty leaves the port alone, matching how most hosting
    /// platforms export an empty variable when no port is assigned.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let Some(raw) = lookup(PORT_ENV) else {
            return Ok(());
        };
        let value = raw.trim();
        if value.is_empty() {
            return Ok(());
        }

        self.server.port = value.parse().map_err(|e| ConfigError::InvalidPort {
            value: raw.clone(),
            source: e,
        })?;
        Ok(())
    }

    /// Load from `path`, then apply the process environment.
    pub fn resolve(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }
}
