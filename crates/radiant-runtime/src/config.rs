#![forbid(unsafe_code)]

//! Session configuration.
//!
//! Defaults come from [`Default`], a JSON document can replace any subset of
//! fields, and environment variables override both:
//!
//! | Variable               | Field                                  |
//! |------------------------|----------------------------------------|
//! | `RADIANT_STORAGE_PATH` | `storage` (switches to a file store)   |
//! | `RADIANT_MAX_TICKS`    | `max_ticks_per_drain`                  |
//! | `RADIANT_LOG`          | `log.filter`                           |
//! | `RADIANT_LOG_JSON`     | `log.json` (`1`/`true` enable)         |

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const ENV_STORAGE_PATH: &str = "RADIANT_STORAGE_PATH";
pub const ENV_MAX_TICKS: &str = "RADIANT_MAX_TICKS";
pub const ENV_LOG: &str = "RADIANT_LOG";
pub const ENV_LOG_JSON: &str = "RADIANT_LOG_JSON";

/// Where a session keeps persisted UI state.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StorageBackendConfig {
    /// Forgotten when the session ends.
    #[default]
    Memory,
    /// JSON file, kept across runs.
    File { path: PathBuf },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// `tracing-subscriber` `EnvFilter` directive.
    pub filter: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_owned(),
            json: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub storage: StorageBackendConfig,
    /// Upper bound on ticks run by one `Session::drain`.
    pub max_ticks_per_drain: usize,
    pub log: LogConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            storage: StorageBackendConfig::Memory,
            max_ticks_per_drain: 64,
            log: LogConfig::default(),
        }
    }
}

impl SessionConfig {
    /// Parse a JSON document; missing fields keep their defaults.
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Defaults with process environment overrides applied.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env_with(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// Apply overrides read through `lookup` (normally `std::env::var`).
    pub fn apply_env_with(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(path) = lookup(ENV_STORAGE_PATH)
            && !path.is_empty()
        {
            self.storage = StorageBackendConfig::File { path: path.into() };
        }
        if let Some(val) = lookup(ENV_MAX_TICKS) {
            self.max_ticks_per_drain = val
                .parse()
                .ok()
                .filter(|n| *n > 0)
                .ok_or(ConfigError::InvalidEnv {
                    name: ENV_MAX_TICKS,
                    value: val,
                })?;
        }
        if let Some(filter) = lookup(ENV_LOG) {
            self.log.filter = filter;
        }
        if let Some(val) = lookup(ENV_LOG_JSON) {
            self.log.json = val == "1" || val.eq_ignore_ascii_case("true");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.storage, StorageBackendConfig::Memory);
        assert_eq!(config.max_ticks_per_drain, 64);
        assert_eq!(config.log.filter, "info");
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config = SessionConfig::from_json_str(
            r#"{"storage": {"kind": "file", "path": "/tmp/ui.json"}, "log": {"json": true}}"#,
        )
        .unwrap();
        assert_eq!(
            config.storage,
            StorageBackendConfig::File {
                path: "/tmp/ui.json".into()
            }
        );
        assert!(config.log.json);
        assert_eq!(config.log.filter, "info");
        assert_eq!(config.max_ticks_per_drain, 64);
    }

    #[test]
    fn env_overrides() {
        let mut config = SessionConfig::default();
        config
            .apply_env_with(env(&[
                (ENV_STORAGE_PATH, "/var/lib/radiant/state.json"),
                (ENV_MAX_TICKS, "8"),
                (ENV_LOG, "radiant_runtime=debug"),
                (ENV_LOG_JSON, "TRUE"),
            ]))
            .unwrap();
        assert_eq!(
            config.storage,
            StorageBackendConfig::File {
                path: "/var/lib/radiant/state.json".into()
            }
        );
        assert_eq!(config.max_ticks_per_drain, 8);
        assert_eq!(config.log.filter, "radiant_runtime=debug");
        assert!(config.log.json);
    }

    #[test]
    fn bad_tick_bound_is_rejected() {
        let mut config = SessionConfig::default();
        for bad in ["0", "many"] {
            let err = config
                .apply_env_with(env(&[(ENV_MAX_TICKS, bad)]))
                .unwrap_err();
            assert!(matches!(err, ConfigError::InvalidEnv { name: ENV_MAX_TICKS, .. }));
        }
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(matches!(
            SessionConfig::from_json_str("{"),
            Err(ConfigError::Json(_))
        ));
    }
}
