//! Runtime configuration.
//!
//! Loaded from `relive.toml`, searched in order:
//!
//! 1. the current directory
//! 2. `~/.config/relive/`
//! 3. the system configuration directory (`dirs::config_dir()/relive/`)
//!
//! Environment variables override file values:
//!
//! - `RELIVE_HISTORY_SIZE`: generations kept for undo
//! - `RELIVE_SELF_VERIFY`: `1`/`true` or `0`/`false`
//!
//! ```toml
//! base_dir = "."
//! poll_interval_ms = 250
//! watcher = "poll"
//!
//! [history]
//! max_size = 16
//!
//! [swap]
//! self_verify = false
//!
//! [[projects]]
//! name = "game"
//! compiler = "rustc"
//! flag_style = "rustc"
//! optimization = "debug"
//! ```

use std::path::{Path, PathBuf};

use dirs::{config_dir, home_dir};
use relive_build::{validate_projects, ProjectConfig};
use relive_core::{ConfigError, HistoryConfig, SwapConfig};
use serde::{Deserialize, Serialize};

/// Configuration file name.
pub const CONFIG_FILE_NAME: &str = "relive.toml";

pub const ENV_HISTORY_SIZE: &str = "RELIVE_HISTORY_SIZE";
pub const ENV_SELF_VERIFY: &str = "RELIVE_SELF_VERIFY";

/// How watched files are observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WatchBackend {
    /// Stat every watched file each `poll_interval_ms`.
    #[default]
    Poll,
    /// Platform file notifications; falls back to polling when they are
    /// unavailable.
    Notify,
}

/// Everything the runtime needs to start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Directory relative source declarations are resolved against.
    /// `None` means the current directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_dir: Option<PathBuf>,

    /// How often watched files are checked.
    ///
    /// Default: 250
    pub poll_interval_ms: u64,

    /// Default: poll
    pub watcher: WatchBackend,

    pub history: HistoryConfig,
    pub swap: SwapConfig,
    pub projects: Vec<ProjectConfig>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            base_dir: None,
            poll_interval_ms: 250,
            watcher: WatchBackend::Poll,
            history: HistoryConfig::default(),
            swap: SwapConfig::default(),
            projects: Vec::new(),
        }
    }
}

impl RuntimeConfig {
    /// Load from the first config file found, or defaults; then apply
    /// environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match Self::find_config_file() {
            Some(path) => Self::load_from_path(&path)?,
            None => Self::default(),
        };
        config.apply_env(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|err| ConfigError::Read(format!("{}: {}", path.display(), err)))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|err| ConfigError::Parse(err.to_string()))
    }

    pub fn save_to_path(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|err| ConfigError::Read(format!("{}: {}", parent.display(), err)))?;
        }
        std::fs::write(path, self.to_toml()?)
            .map_err(|err| ConfigError::Read(format!("{}: {}", path.display(), err)))
    }

    /// Apply overrides, reading variables through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ENV_HISTORY_SIZE) {
            self.history.max_size = value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                name: ENV_HISTORY_SIZE,
                value: value.clone(),
            })?;
        }
        if let Some(value) = lookup(ENV_SELF_VERIFY) {
            self.swap.self_verify = match value.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                _ => {
                    return Err(ConfigError::InvalidEnv {
                        name: ENV_SELF_VERIFY,
                        value,
                    })
                },
            };
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.history.validate()?;
        validate_projects(&self.projects)
    }

    pub fn project(&self, name: &str) -> Option<&ProjectConfig> {
        self.projects.iter().find(|project| project.name == name)
    }

    /// The base directory, defaulting to the current directory.
    pub fn resolved_base_dir(&self) -> PathBuf {
        match &self.base_dir {
            Some(dir) => dir.clone(),
            None => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        }
    }

    fn check_current_dir_config() -> Option<PathBuf> {
        let path = PathBuf::from(CONFIG_FILE_NAME);
        path.exists().then_some(path)
    }

    fn check_home_config() -> Option<PathBuf> {
        home_dir()
            .map(|dir| dir.join(".config").join("relive").join(CONFIG_FILE_NAME))
            .filter(|path| path.exists())
    }

    fn check_system_config() -> Option<PathBuf> {
        config_dir()
            .map(|dir| dir.join("relive").join(CONFIG_FILE_NAME))
            .filter(|path| path.exists())
    }

    /// First config file in the search order.
    pub fn find_config_file() -> Option<PathBuf> {
        Self::check_current_dir_config()
            .or_else(Self::check_home_config)
            .or_else(Self::check_system_config)
    }
}
