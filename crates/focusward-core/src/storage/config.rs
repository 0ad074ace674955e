//! TOML-based application configuration.
//!
//! Stores user preferences including:
//! - Default session length and tick cadence
//! - The seed list of distracting sites
//! - Streak threshold and history cap
//!
//! Configuration is stored at `<data_dir>/config.toml`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::data_dir;
use crate::error::ConfigError;

/// Timer-specific configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerConfig {
    /// Session length used when a start request carries no usable duration.
    #[serde(default = "default_duration_secs")]
    pub default_duration_secs: u64,
    /// Period of the recurring reconciliation wake-up.
    #[serde(default = "default_tick_interval_secs")]
    pub tick_interval_secs: u64,
}

/// Distracting-site configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SitesConfig {
    /// Seeded into the stored site list the first time it is read.
    #[serde(default = "default_sites")]
    pub defaults: Vec<String>,
}

/// Statistics configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsConfig {
    /// Minimum focus minutes for a day to extend the streak.
    #[serde(default = "default_streak_threshold")]
    pub streak_threshold_minutes: u64,
    /// Maximum number of completed sessions kept in history.
    #[serde(default = "default_history_cap")]
    pub history_cap: usize,
}

/// Application configuration.
///
/// Serialized to/from TOML at `<data_dir>/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub timer: TimerConfig,
    #[serde(default)]
    pub sites: SitesConfig,
    #[serde(default)]
    pub stats: StatsConfig,
}

// Default functions
fn default_duration_secs() -> u64 {
    25 * 60
}
fn default_tick_interval_secs() -> u64 {
    60
}
fn default_sites() -> Vec<String> {
    [
        "youtube.com",
        "reddit.com",
        "twitter.com",
        "x.com",
        "facebook.com",
        "instagram.com",
        "tiktok.com",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}
fn default_streak_threshold() -> u64 {
    30
}
fn default_history_cap() -> usize {
    200
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            default_duration_secs: default_duration_secs(),
            tick_interval_secs: default_tick_interval_secs(),
        }
    }
}

impl Default for SitesConfig {
    fn default() -> Self {
        Self {
            defaults: default_sites(),
        }
    }
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            streak_threshold_minutes: default_streak_threshold(),
            history_cap: default_history_cap(),
        }
    }
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let unknown = || ConfigError::UnknownKey(key.to_string());
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        let mut parts = key.split('.').peekable();
        if parts.peek().is_none() || key.is_empty() {
            return Err(unknown());
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            if parts.peek().is_none() {
                let obj = current.as_object_mut().ok_or_else(unknown)?;
                let existing = obj.get(part).ok_or_else(unknown)?;

                let new_value = match existing {
                    serde_json::Value::Bool(_) => serde_json::Value::Bool(
                        value.parse::<bool>().map_err(|e| invalid(e.to_string()))?,
                    ),
                    serde_json::Value::Number(_) => {
                        let n = value
                            .parse::<u64>()
                            .map_err(|_| invalid(format!("cannot parse '{value}' as a whole number")))?;
                        serde_json::Value::Number(n.into())
                    }
                    serde_json::Value::Array(_) => serde_json::Value::Array(
                        value
                            .split(',')
                            .map(str::trim)
                            .filter(|s| !s.is_empty())
                            .map(|s| serde_json::Value::String(s.to_string()))
                            .collect(),
                    ),
                    serde_json::Value::Object(_) => return Err(unknown()),
                    _ => serde_json::Value::String(value.into()),
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current.get_mut(part).ok_or_else(unknown)?;
        }

        Err(unknown())
    }

    fn path() -> Result<PathBuf, ConfigError> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from the data directory, writing defaults on first use.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::path()?)
    }

    /// Load from an explicit file, writing defaults when it is missing.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let cfg: Self = toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                })?;
                Ok(cfg.repaired())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
            Err(e) => Err(ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
        }
    }

    /// Persist to the data directory.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    /// Persist to an explicit file.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Array(items) => Some(
                items
                    .iter()
                    .filter_map(|v| v.as_str())
                    .collect::<Vec<_>>()
                    .join(","),
            ),
            other => Some(other.to_string()),
        }
    }

    /// Set a config value by key. Arrays take a comma-separated list.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the value does not fit it.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut json = serde_json::to_value(&*self).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let updated: Config = serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        updated.validate()?;
        *self = updated;
        Ok(())
    }

    /// Reject values the engine cannot run with.
    /// Replace out-of-range values read from disk with their defaults.
    fn repaired(mut self) -> Self {
        while let Err(ConfigError::InvalidValue { key, message }) = self.validate() {
            tracing::warn!(key = %key, message = %message, "invalid config value, using default");
            let defaults = Self::default();
            match key.as_str() {
                "timer.default_duration_secs" => {
                    self.timer.default_duration_secs = defaults.timer.default_duration_secs;
                }
                "timer.tick_interval_secs" => {
                    self.timer.tick_interval_secs = defaults.timer.tick_interval_secs;
                }
                "stats.history_cap" => self.stats.history_cap = defaults.stats.history_cap,
                _ => return defaults,
            }
        }
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timer.default_duration_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "timer.default_duration_secs".into(),
                message: "must be greater than zero".into(),
            });
        }
        if self.timer.tick_interval_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "timer.tick_interval_secs".into(),
                message: "must be greater than zero".into(),
            });
        }
        if self.stats.history_cap == 0 {
            return Err(ConfigError::InvalidValue {
                key: "stats.history_cap".into(),
                message: "must be greater than zero".into(),
            });
        }
        Ok(())
    }
}
