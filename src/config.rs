//! Configuration types.

use std::path::PathBuf;
use std::time::Duration;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::error::ConfigError;

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Maximum number of universities a user may lock at once.
    pub max_locked: usize,
    /// How long an operation waits for the per-user scope before giving up.
    pub scope_wait: Duration,
    /// Multiplier applied to the profile budget when filtering the catalog.
    pub budget_buffer: Decimal,
    /// Maximum number of universities returned by a catalog filter.
    pub filter_limit: usize,
    /// Location of the libSQL database file.
    pub db_path: PathBuf,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_locked: 5,
            scope_wait: Duration::from_secs(5),
            budget_buffer: dec!(1.2),
            filter_limit: 30,
            db_path: PathBuf::from("./data/counsel.db"),
        }
    }
}

impl EngineConfig {
    /// Build a configuration from `COUNSEL_*` environment variables,
    /// falling back to defaults for unset keys.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(raw) = lookup("COUNSEL_MAX_LOCKED") {
            let max: usize = parse_value("COUNSEL_MAX_LOCKED", &raw)?;
            if max == 0 {
                return Err(invalid("COUNSEL_MAX_LOCKED", "must be at least 1"));
            }
            config.max_locked = max;
        }

        if let Some(raw) = lookup("COUNSEL_SCOPE_WAIT_MS") {
            let ms: u64 = parse_value("COUNSEL_SCOPE_WAIT_MS", &raw)?;
            config.scope_wait = Duration::from_millis(ms);
        }

        if let Some(raw) = lookup("COUNSEL_BUDGET_BUFFER") {
            let buffer: Decimal = parse_value("COUNSEL_BUDGET_BUFFER", &raw)?;
            if buffer < Decimal::ONE {
                return Err(invalid("COUNSEL_BUDGET_BUFFER", "must be >= 1.0"));
            }
            config.budget_buffer = buffer;
        }

        if let Some(raw) = lookup("COUNSEL_FILTER_LIMIT") {
            config.filter_limit = parse_value("COUNSEL_FILTER_LIMIT", &raw)?;
        }

        if let Some(path) = lookup("COUNSEL_DB_PATH") {
            config.db_path = PathBuf::from(path);
        }

        Ok(config)
    }
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| invalid(key, &e.to_string()))
}

fn invalid(key: &str, message: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        message: message.to_string(),
    }
}
