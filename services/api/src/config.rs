//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use quillify_core::AutosaveConfig;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    /// Without a database URL chapters are kept in memory.
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub log_level: Level,
    pub allowed_origin: String,
    pub autosave_debounce: Duration,
    pub autosave_max_retries: u32,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        // --- Server and Database Settings ---
        let bind_address: SocketAddr = parse_or(&lookup, "BIND_ADDRESS", "0.0.0.0:3000")?;
        let database_url = lookup("DATABASE_URL").filter(|url| !url.trim().is_empty());
        let db_max_connections: u32 = parse_or(&lookup, "DB_MAX_CONNECTIONS", "5")?;

        let log_level_str = lookup("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let allowed_origin =
            lookup("ALLOWED_ORIGIN").unwrap_or_else(|| "http://localhost:5173".to_string());

        // --- Autosave Settings ---
        let debounce_ms: u64 = parse_or(&lookup, "AUTOSAVE_DEBOUNCE_MS", "2000")?;
        if debounce_ms == 0 {
            return Err(ConfigError::InvalidValue(
                "AUTOSAVE_DEBOUNCE_MS".to_string(),
                "must be greater than zero".to_string(),
            ));
        }
        let autosave_max_retries: u32 = parse_or(&lookup, "AUTOSAVE_MAX_RETRIES", "3")?;

        Ok(Self {
            bind_address,
            database_url,
            db_max_connections,
            log_level,
            allowed_origin,
            autosave_debounce: Duration::from_millis(debounce_ms),
            autosave_max_retries,
        })
    }

    pub fn autosave(&self) -> AutosaveConfig {
        AutosaveConfig {
            debounce: self.autosave_debounce,
            max_retries: self.autosave_max_retries,
        }
    }
}

fn parse_or<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: &str,
) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = lookup(key).unwrap_or_else(|| default.to_string());
    raw.trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidValue(key.to_string(), e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.bind_address, "0.0.0.0:3000".parse::<SocketAddr>().unwrap());
        assert_eq!(config.database_url, None);
        assert_eq!(config.log_level, Level::INFO);
        assert_eq!(config.autosave(), AutosaveConfig::default());
    }

    #[test]
    fn autosave_settings_are_read_from_the_environment() {
        let config = config_from(&[
            ("AUTOSAVE_DEBOUNCE_MS", "750"),
            ("AUTOSAVE_MAX_RETRIES", "0"),
            ("DATABASE_URL", "postgres://localhost/quillify"),
        ])
        .unwrap();
        assert_eq!(config.autosave_debounce, Duration::from_millis(750));
        assert_eq!(config.autosave_max_retries, 0);
        assert_eq!(
            config.database_url.as_deref(),
            Some("postgres://localhost/quillify")
        );
    }

    #[test]
    fn invalid_values_name_the_variable() {
        let err = config_from(&[("BIND_ADDRESS", "not an address")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(ref key, _) if key == "BIND_ADDRESS"));

        let err = config_from(&[("AUTOSAVE_DEBOUNCE_MS", "0")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(ref key, _) if key == "AUTOSAVE_DEBOUNCE_MS"));

        assert!(config_from(&[("RUST_LOG", "chatty")]).is_err());
    }
}
