//! Configuration management

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Execution engine configuration
    #[serde(default)]
    pub execution: ExecutionConfig,

    /// Input capture configuration
    #[serde(default)]
    pub input: InputConfig,

    /// Macro storage configuration
    #[serde(default)]
    pub storage: StorageConfig,

    /// Path to config file (not serialized)
    #[serde(skip)]
    config_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Condition polling interval (ms)
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// Default condition timeout when a block does not carry one (s)
    #[serde(default = "default_timeout")]
    pub default_timeout_secs: u64,

    /// Trigger hotkey spec, e.g. "ctrl+m"
    #[serde(default = "default_hotkey")]
    pub hotkey: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputConfig {
    /// Whether to record keyboard events
    #[serde(default = "default_true")]
    pub capture_keyboard: bool,

    /// Whether to record mouse clicks
    #[serde(default = "default_true")]
    pub capture_mouse_click: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory for saved macro files; platform data dir when unset
    pub macro_dir: Option<PathBuf>,
}

fn default_poll_interval() -> u64 {
    100
}

fn default_timeout() -> u64 {
    5
}

fn default_hotkey() -> String {
    "ctrl+m".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval(),
            default_timeout_secs: default_timeout(),
            hotkey: default_hotkey(),
        }
    }
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            capture_keyboard: true,
            capture_mouse_click: true,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { macro_dir: None }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            execution: ExecutionConfig::default(),
            input: InputConfig::default(),
            storage: StorageConfig::default(),
            config_path: None,
        }
    }
}

impl Config {
    /// Load configuration from the default location or create defaults.
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path()?;

        if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path)
                .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

            let mut config: Config = toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {:?}", config_path))?;

            config.config_path = Some(config_path);
            Ok(config)
        } else {
            let config = Config::default();
            config.save()?;
            Ok(config)
        }
    }

    /// Save configuration to file.
    pub fn save(&self) -> Result<()> {
        let config_path = match self.config_path.clone() {
            Some(path) => path,
            None => Self::default_config_path()?,
        };

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(&config_path, contents)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;

        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.execution.poll_interval_ms)
    }

    pub fn default_condition_timeout(&self) -> Duration {
        Duration::from_secs(self.execution.default_timeout_secs)
    }

    fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = directories::ProjectDirs::from("dev", "macropilot", "macropilot")
            .context("Failed to determine config directory")?;

        Ok(proj_dirs.config_dir().join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_missing_sections() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.execution.poll_interval_ms, 100);
        assert_eq!(config.execution.hotkey, "ctrl+m");
        assert!(config.input.capture_keyboard);
        assert!(config.storage.macro_dir.is_none());
    }

    #[test]
    fn partial_config_keeps_other_defaults() {
        let config: Config = toml::from_str(
            r#"
            [execution]
            poll_interval_ms = 250
            "#,
        )
        .unwrap();
        assert_eq!(config.execution.poll_interval_ms, 250);
        assert_eq!(config.execution.default_timeout_secs, 5);
    }

    #[test]
    fn round_trips_through_toml() {
        let config = Config::default();
        let text = toml::to_string_pretty(&config).unwrap();
        let back: Config = toml::from_str(&text).unwrap();
        assert_eq!(back.execution.hotkey, config.execution.hotkey);
    }
}
