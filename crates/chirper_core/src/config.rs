//! Process configuration for hosts embedding the tweet core.
//!
//! Resolution order: defaults, then environment variables, then
//! command-line flags. Later sources win.
//!
//! | setting     | env var             | flag           |
//! |-------------|---------------------|----------------|
//! | `db_path`   | `CHIRPER_DB_PATH`   | `--db=PATH`    |
//! | `log_level` | `CHIRPER_LOG_LEVEL` | `--log-level=` |
//! | `log_dir`   | `CHIRPER_LOG_DIR`   | `--log-dir=`   |

use crate::logging::{default_log_level, normalize_level};
use std::path::PathBuf;
use thiserror::Error;

pub const ENV_DB_PATH: &str = "CHIRPER_DB_PATH";
pub const ENV_LOG_LEVEL: &str = "CHIRPER_LOG_LEVEL";
pub const ENV_LOG_DIR: &str = "CHIRPER_LOG_DIR";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0}")]
    InvalidLogLevel(String),
    #[error("{setting} cannot be empty")]
    Empty { setting: &'static str },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreConfig {
    /// SQLite database file. `None` means a private in-memory store.
    pub db_path: Option<PathBuf>,
    /// One of `trace|debug|info|warn|error`.
    pub log_level: &'static str,
    /// Directory for rolling log files. `None` disables file logging.
    pub log_dir: Option<PathBuf>,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            log_level: default_log_level(),
            log_dir: None,
        }
    }
}

impl CoreConfig {
    /// Resolves configuration from the process environment and `args`.
    pub fn load(args: &[String]) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env(|key| std::env::var(key).ok())?;
        config.apply_args(args)?;
        Ok(config)
    }

    /// Applies environment overrides read through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ENV_DB_PATH) {
            self.db_path = Some(non_empty_path("db_path", &value)?);
        }
        if let Some(value) = lookup(ENV_LOG_LEVEL) {
            self.log_level = normalize_level(&value).map_err(ConfigError::InvalidLogLevel)?;
        }
        if let Some(value) = lookup(ENV_LOG_DIR) {
            self.log_dir = Some(non_empty_path("log_dir", &value)?);
        }
        Ok(())
    }

    /// Applies `--db=`, `--log-level=` and `--log-dir=` flags.
    ///
    /// Unknown arguments are ignored so hosts can mix in their own flags.
    pub fn apply_args(&mut self, args: &[String]) -> Result<(), ConfigError> {
        for arg in args {
            if let Some(value) = arg.strip_prefix("--db=") {
                self.db_path = Some(non_empty_path("db_path", value)?);
            } else if let Some(value) = arg.strip_prefix("--log-level=") {
                self.log_level = normalize_level(value).map_err(ConfigError::InvalidLogLevel)?;
            } else if let Some(value) = arg.strip_prefix("--log-dir=") {
                self.log_dir = Some(non_empty_path("log_dir", value)?);
            }
        }
        Ok(())
    }
}

fn non_empty_path(setting: &'static str, value: &str) -> Result<PathBuf, ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Empty { setting });
    }
    Ok(PathBuf::from(trimmed))
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, CoreConfig, ENV_DB_PATH, ENV_LOG_LEVEL};
    use std::collections::HashMap;
    use std::path::PathBuf;

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn flags_override_environment() {
        let env: HashMap<&str, &str> =
            HashMap::from([(ENV_DB_PATH, "/var/lib/chirper/env.db"), (ENV_LOG_LEVEL, "WARNING")]);
        let mut config = CoreConfig::default();
        config
            .apply_env(|key| env.get(key).map(|value| value.to_string()))
            .unwrap();
        assert_eq!(config.log_level, "warn");
        assert_eq!(config.db_path, Some(PathBuf::from("/var/lib/chirper/env.db")));

        config
            .apply_args(&args(&["migrate", "--db=/tmp/flag.db", "--verbose"]))
            .unwrap();
        assert_eq!(config.db_path, Some(PathBuf::from("/tmp/flag.db")));
        assert_eq!(config.log_dir, None);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let mut config = CoreConfig::default();
        let err = config.apply_args(&args(&["--log-level=loud"])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidLogLevel(_)));

        let err = config.apply_args(&args(&["--db= "])).unwrap_err();
        assert_eq!(err, ConfigError::Empty { setting: "db_path" });
    }
}
