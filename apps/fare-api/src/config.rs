//! Fare API configuration module.
//!
//! Configuration is loaded from environment variables with fallback to defaults.

use serde::{Deserialize, Serialize};
use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use farelink_core::resolver::DEFAULT_MIN_FUZZY_LEN;
use farelink_core::{FareOptions, Money, ResolverOptions};
use farelink_db::DbConfig;

/// Fuzzy matching below two hex characters (one byte) would match most cards.
const MIN_FUZZY_FLOOR: usize = 2;

/// Fare API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// HTTP server port
    pub http_port: u16,

    /// Interface to bind
    pub bind_addr: String,

    /// SQLite database file
    pub database_path: PathBuf,

    /// Pool size
    pub db_max_connections: u32,

    /// Shortest UID (hex chars) allowed to take part in a prefix match
    pub min_fuzzy_uid_len: usize,

    /// Largest single fare accepted, unbounded when absent
    pub max_fare: Option<Money>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        ApiConfig {
            http_port: 8080,
            bind_addr: "0.0.0.0".to_string(),
            database_path: PathBuf::from("./data/farelink.db"),
            db_max_connections: 5,
            min_fuzzy_uid_len: DEFAULT_MIN_FUZZY_LEN,
            max_fare: None,
        }
    }
}

impl ApiConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any key lookup (the process environment
    /// in production, a map in tests).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = ApiConfig::default();

        let config = ApiConfig {
            http_port: lookup("FARELINK_HTTP_PORT")
                .unwrap_or_else(|| defaults.http_port.to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("FARELINK_HTTP_PORT".to_string()))?,

            bind_addr: lookup("FARELINK_BIND_ADDR").unwrap_or(defaults.bind_addr),

            database_path: lookup("FARELINK_DATABASE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.database_path),

            db_max_connections: lookup("FARELINK_DB_MAX_CONNECTIONS")
                .unwrap_or_else(|| defaults.db_max_connections.to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("FARELINK_DB_MAX_CONNECTIONS".to_string()))?,

            min_fuzzy_uid_len: lookup("FARELINK_MIN_FUZZY_UID_LEN")
                .unwrap_or_else(|| defaults.min_fuzzy_uid_len.to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("FARELINK_MIN_FUZZY_UID_LEN".to_string()))?,

            max_fare: lookup("FARELINK_MAX_FARE")
                .map(|raw| raw.parse::<Money>())
                .transpose()
                .map_err(|_| ConfigError::InvalidValue("FARELINK_MAX_FARE".to_string()))?,
        };

        if config.min_fuzzy_uid_len < MIN_FUZZY_FLOOR {
            return Err(ConfigError::InvalidValue("FARELINK_MIN_FUZZY_UID_LEN".to_string()));
        }
        if config.db_max_connections == 0 {
            return Err(ConfigError::InvalidValue("FARELINK_DB_MAX_CONNECTIONS".to_string()));
        }
        if matches!(config.max_fare, Some(max) if !max.is_positive()) {
            return Err(ConfigError::InvalidValue("FARELINK_MAX_FARE".to_string()));
        }

        Ok(config)
    }

    /// Socket address to listen on.
    pub fn listen_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.bind_addr, self.http_port)
            .parse()
            .map_err(|_| ConfigError::InvalidValue("FARELINK_BIND_ADDR".to_string()))
    }

    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(&self.database_path).max_connections(self.db_max_connections)
    }

    pub fn resolver_options(&self) -> ResolverOptions {
        ResolverOptions {
            min_fuzzy_len: self.min_fuzzy_uid_len,
        }
    }

    pub fn fare_options(&self) -> FareOptions {
        FareOptions {
            max_fare: self.max_fare,
        }
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> Result<ApiConfig, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ApiConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[]).unwrap();

        assert_eq!(config.http_port, 8080);
        assert_eq!(config.database_path, PathBuf::from("./data/farelink.db"));
        assert_eq!(config.resolver_options().min_fuzzy_len, 4);
        assert_eq!(config.fare_options().max_fare, None);
        assert_eq!(config.listen_addr().unwrap().port(), 8080);
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("FARELINK_HTTP_PORT", "9000"),
            ("FARELINK_BIND_ADDR", "127.0.0.1"),
            ("FARELINK_MIN_FUZZY_UID_LEN", "6"),
            ("FARELINK_MAX_FARE", "2500"),
        ])
        .unwrap();

        assert_eq!(config.listen_addr().unwrap().to_string(), "127.0.0.1:9000");
        assert_eq!(config.min_fuzzy_uid_len, 6);
        assert_eq!(config.max_fare, Some(Money::from_units(2500)));
    }

    #[test]
    fn test_malformed_values_rejected() {
        assert!(matches!(
            load(&[("FARELINK_HTTP_PORT", "eighty")]),
            Err(ConfigError::InvalidValue(key)) if key == "FARELINK_HTTP_PORT"
        ));
        assert!(load(&[("FARELINK_MIN_FUZZY_UID_LEN", "1")]).is_err());
        assert!(load(&[("FARELINK_MAX_FARE", "-5")]).is_err());
        assert!(load(&[("FARELINK_DB_MAX_CONNECTIONS", "0")]).is_err());
    }
}
