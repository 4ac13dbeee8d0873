//! TOML-based engine configuration.
//!
//! Stores:
//! - The reference UTC offset used for "today" in deadline and report logic
//! - Generation horizon and batch pacing
//! - Default duplicate-guard granularity
//! - Default team members for generation
//!
//! Configuration is stored at `~/.config/cadence/config.toml`.

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::data_dir;
use crate::error::{ConfigError, Result};
use crate::reconcile::BatchOptions;
use crate::recurrence::GuardScope;

/// Engine behavior.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EngineConfig {
    /// Offset of the reference zone from UTC, in minutes
    #[serde(default)]
    pub utc_offset_minutes: i32,
    /// Days ahead of today that `generate` covers when no end date is given
    #[serde(default = "default_horizon_days")]
    pub generation_horizon_days: u32,
    /// Pause between inserts in a generation batch
    #[serde(default)]
    pub batch_delay_ms: u64,
    #[serde(default)]
    pub guard_scope: GuardScope,
}

/// Team defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct TeamConfig {
    /// Owners used by `generate` when none are given
    #[serde(default)]
    pub members: Vec<String>,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/cadence/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub team: TeamConfig,
}

fn default_horizon_days() -> u32 {
    30
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            utc_offset_minutes: 0,
            generation_horizon_days: default_horizon_days(),
            batch_delay_ms: 0,
            guard_scope: GuardScope::PerDay,
        }
    }
}

fn invalid(key: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        message: message.into(),
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
    ) -> std::result::Result<(), ConfigError> {
        let mut parts = key.split('.').peekable();
        if key.is_empty() {
            return Err(invalid(key, "config key is empty"));
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            if parts.peek().is_some() {
                current = current
                    .get_mut(part)
                    .ok_or_else(|| invalid(key, "unknown config key"))?;
                continue;
            }

            let obj = current
                .as_object_mut()
                .ok_or_else(|| invalid(key, "unknown config key"))?;
            let existing = obj
                .get(part)
                .ok_or_else(|| invalid(key, "unknown config key"))?;

            let new_value = match existing {
                serde_json::Value::Bool(_) => serde_json::Value::Bool(
                    value
                        .parse::<bool>()
                        .map_err(|e| invalid(key, e.to_string()))?,
                ),
                serde_json::Value::Number(_) => {
                    if let Ok(n) = value.parse::<i64>() {
                        serde_json::Value::Number(n.into())
                    } else {
                        return Err(invalid(key, format!("cannot parse '{value}' as integer")));
                    }
                }
                serde_json::Value::Array(_) => serde_json::Value::Array(
                    value
                        .split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(|s| serde_json::Value::String(s.to_string()))
                        .collect(),
                ),
                serde_json::Value::Object(_) => {
                    return Err(invalid(key, "key names a section, not a value"));
                }
                _ => serde_json::Value::String(value.into()),
            };

            obj.insert(part.to_string(), new_value);
            return Ok(());
        }

        Err(invalid(key, "unknown config key"))
    }

    /// Default config file location.
    pub fn path() -> Result<PathBuf> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from the default location, writing defaults if the file is missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::path()?)
    }

    /// Load from `path`, writing defaults there if the file is missing.
    pub fn load_from(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(|e| {
                ConfigError::LoadFailed {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                }
                .into()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
            Err(e) => Err(ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }
            .into()),
        }
    }

    /// Persist to the default location.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))?;
        Ok(())
    }

    /// Load from disk, returning default on error.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_else(|e| {
            tracing::warn!("Using default configuration: {}", e);
            Self::default()
        })
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a config value by dot-separated key, in memory only.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] if the key is unknown or the
    /// value does not fit the key's type.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let mut json = serde_json::to_value(&*self)?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let updated: Config =
            serde_json::from_value(json).map_err(|e| invalid(key, e.to_string()))?;
        updated.reference_offset().map_err(|_| {
            invalid(key, "utc_offset_minutes must be within +/-24h")
        })?;
        *self = updated;
        Ok(())
    }

    /// The reference zone as a fixed offset.
    pub fn reference_offset(&self) -> std::result::Result<FixedOffset, ConfigError> {
        self.engine
            .utc_offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .ok_or_else(|| {
                invalid(
                    "engine.utc_offset_minutes",
                    format!("{} is out of range", self.engine.utc_offset_minutes),
                )
            })
    }

    /// Current time in the reference zone.
    pub fn now(&self) -> std::result::Result<DateTime<FixedOffset>, ConfigError> {
        Ok(Utc::now().with_timezone(&self.reference_offset()?))
    }

    pub fn batch_options(&self) -> BatchOptions {
        BatchOptions::default()
            .with_scope(self.engine.guard_scope)
            .with_delay_ms(self.engine.batch_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn default_config_roundtrip() {
        let cfg = Config::default();
        let toml_str = toml::to_string_pretty(&cfg).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, cfg);
        assert_eq!(parsed.engine.generation_horizon_days, 30);
    }

    #[test]
    fn missing_sections_use_defaults() {
        let parsed: Config = toml::from_str("[engine]\nutc_offset_minutes = 540\n").unwrap();
        assert_eq!(parsed.engine.utc_offset_minutes, 540);
        assert_eq!(parsed.engine.generation_horizon_days, 30);
        assert_eq!(parsed.engine.guard_scope, GuardScope::PerDay);
        assert!(parsed.team.members.is_empty());
    }

    #[test]
    fn get_supports_dot_path_keys() {
        let cfg = Config::default();
        assert_eq!(cfg.get("engine.batch_delay_ms").as_deref(), Some("0"));
        assert_eq!(cfg.get("engine.guard_scope").as_deref(), Some("per_day"));
        assert!(cfg.get("engine.missing_key").is_none());
    }

    #[test]
    fn set_updates_numbers_including_negative() {
        let mut cfg = Config::default();
        cfg.set("engine.utc_offset_minutes", "-300").unwrap();
        assert_eq!(cfg.engine.utc_offset_minutes, -300);
        assert_eq!(cfg.reference_offset().unwrap().local_minus_utc(), -300 * 60);
    }

    #[test]
    fn set_updates_enum_and_list() {
        let mut cfg = Config::default();
        cfg.set("engine.guard_scope", "per_owner_day").unwrap();
        assert_eq!(cfg.engine.guard_scope, GuardScope::PerOwnerDay);

        cfg.set("team.members", "emp-1, emp-2").unwrap();
        assert_eq!(cfg.team.members, vec!["emp-1", "emp-2"]);
    }

    #[test]
    fn set_rejects_unknown_key_and_bad_values() {
        let mut cfg = Config::default();
        assert!(cfg.set("engine.nonexistent", "1").is_err());
        assert!(cfg.set("engine.batch_delay_ms", "soon").is_err());
        assert!(cfg.set("engine.guard_scope", "weekly").is_err());
        assert!(cfg.set("engine.utc_offset_minutes", "100000").is_err());
        assert!(cfg.set("engine", "1").is_err());
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn batch_options_follow_engine_settings() {
        let mut cfg = Config::default();
        cfg.engine.batch_delay_ms = 25;
        let options = cfg.batch_options();
        assert_eq!(options.item_delay, Duration::from_millis(25));
        assert_eq!(options.scope, GuardScope::PerDay);
    }

    #[test]
    fn load_from_writes_defaults_then_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let first = Config::load_from(&path).unwrap();
        assert!(path.exists());

        let mut edited = first.clone();
        edited.engine.utc_offset_minutes = 60;
        edited.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path).unwrap(), edited);
    }

    #[test]
    fn load_from_reports_parse_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[engine\n").unwrap();
        assert!(Config::load_from(&path).is_err());
    }
}
