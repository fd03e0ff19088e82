//! Configuration management for Gramcast

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{ConfigError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub api: ApiConfig,
    pub sessions: SessionsConfig,
    #[serde(default)]
    pub broadcast: BroadcastConfig,
    #[serde(default)]
    pub join: JoinConfig,
}

/// Application credentials handed to the protocol client factory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub id: i32,
    pub hash: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionsConfig {
    /// Directory holding one credential blob per account identifier
    pub dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BroadcastConfig {
    /// Default seconds to wait between two sends
    #[serde(default = "default_send_delay")]
    pub delay_secs: u64,
    /// Default seconds between cycles when auto-repeat is on
    #[serde(default = "default_repeat_interval")]
    pub repeat_interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinConfig {
    /// Seconds to wait after every join attempt (flood control)
    #[serde(default = "default_flood_delay")]
    pub flood_delay_secs: u64,
}

fn default_send_delay() -> u64 {
    10
}

fn default_repeat_interval() -> u64 {
    300
}

fn default_flood_delay() -> u64 {
    2
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            delay_secs: default_send_delay(),
            repeat_interval_secs: default_repeat_interval(),
        }
    }
}

impl Default for JoinConfig {
    fn default() -> Self {
        Self {
            flood_delay_secs: default_flood_delay(),
        }
    }
}

impl Config {
    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        let config_path = resolve_config_path()?;
        Self::load_from_path(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadError)?;
        let config: Config = toml::from_str(&content).map_err(ConfigError::ParseError)?;
        Ok(config)
    }

    /// Create a default configuration
    pub fn default_config() -> Self {
        Self {
            api: ApiConfig {
                id: 0,
                hash: String::new(),
            },
            sessions: SessionsConfig {
                dir: "~/.local/share/gramcast/sessions".to_string(),
            },
            broadcast: BroadcastConfig::default(),
            join: JoinConfig::default(),
        }
    }

    /// Session directory with tilde expansion applied
    pub fn sessions_dir(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.sessions.dir).to_string())
    }
}

/// Resolve the configuration file path following XDG Base Directory spec
pub fn resolve_config_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("GRAMCAST_CONFIG") {
        return Ok(PathBuf::from(shellexpand::tilde(&path).to_string()));
    }

    let config_dir = dirs::config_dir()
        .ok_or_else(|| ConfigError::MissingField("config directory".to_string()))?;

    Ok(config_dir.join("gramcast").join("config.toml"))
}
