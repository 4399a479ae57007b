//! Service configuration read from environment variables.
//!
//! # Environment Variables
//!
//! - `SERVICE_PORT`: HTTP port (default: 8080)
//! - `DANGERZONE_DB_PATH`: SQLite database file, or `memory` (default)
//! - `APP_ENV`: `production` or `development` (default)
//! - `STORE_TIMEOUT_MS`: per-operation store timeout (default: 5000)
//! - `STORE_CONNECT_ATTEMPTS`: startup connection attempts (default: 5)
//! - `STORE_CONNECT_BACKOFF_MS`: pause between attempts (default: 2000)
//! - `RATE_LIMIT_MAX_REQUESTS`: requests per window per client (default: 100)
//! - `RATE_LIMIT_WINDOW_SECS`: rate limit window (default: 900)
//! - `CORS_ALLOW_ORIGIN`: allowed origin, `*` for any (default: `*`)

use std::path::PathBuf;
use std::time::Duration;

use dangerzone_lib::{RetryPolicy, StoreConfig};
use serde::{Deserialize, Serialize};

/// Deployment mode. Controls how much error detail leaves the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Internal error details are included in responses.
    #[default]
    Development,
    /// Internal error details are replaced with a generic message.
    Production,
}

impl Environment {
    /// Parse a mode name. Anything other than `production`/`prod` is development.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "production" | "prod" => Environment::Production,
            _ => Environment::Development,
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }
}

/// Which storage backend the service should open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageTarget {
    Memory,
    Sqlite(PathBuf),
}

impl StorageTarget {
    pub fn parse(s: &str) -> Self {
        match s.trim() {
            "" | "memory" | ":memory:" => StorageTarget::Memory,
            path => StorageTarget::Sqlite(PathBuf::from(path)),
        }
    }
}

/// Fixed-window rate limit settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 100,
            window: Duration::from_secs(15 * 60),
        }
    }
}

/// Complete service configuration.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub port: u16,
    pub storage: StorageTarget,
    pub environment: Environment,
    pub store: StoreConfig,
    pub retry: RetryPolicy,
    pub rate_limit: RateLimitConfig,
    pub cors_allow_origin: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            storage: StorageTarget::Memory,
            environment: Environment::Development,
            store: StoreConfig::default(),
            retry: RetryPolicy::default(),
            rate_limit: RateLimitConfig::default(),
            cors_allow_origin: "*".to_string(),
        }
    }
}

impl ServiceConfig {
    /// Build configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    ///
    /// Unparseable values fall back to their defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let parsed = |key: &str| lookup(key).and_then(|v| v.trim().parse::<u64>().ok());

        let port = lookup("SERVICE_PORT")
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(defaults.port);

        let storage = lookup("DANGERZONE_DB_PATH")
            .map(|v| StorageTarget::parse(&v))
            .unwrap_or(defaults.storage);

        let environment = lookup("APP_ENV")
            .map(|v| Environment::parse(&v))
            .unwrap_or(defaults.environment);

        let store = StoreConfig {
            operation_timeout: parsed("STORE_TIMEOUT_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.store.operation_timeout),
        };

        let retry = RetryPolicy {
            attempts: parsed("STORE_CONNECT_ATTEMPTS")
                .map(|v| v.clamp(1, u32::MAX as u64) as u32)
                .unwrap_or(defaults.retry.attempts),
            backoff: parsed("STORE_CONNECT_BACKOFF_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.retry.backoff),
        };

        let rate_limit = RateLimitConfig {
            max_requests: parsed("RATE_LIMIT_MAX_REQUESTS")
                .map(|v| v.min(u32::MAX as u64) as u32)
                .unwrap_or(defaults.rate_limit.max_requests),
            window: parsed("RATE_LIMIT_WINDOW_SECS")
                .filter(|v| *v > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.rate_limit.window),
        };

        let cors_allow_origin = lookup("CORS_ALLOW_ORIGIN").unwrap_or(defaults.cors_allow_origin);

        Self {
            port,
            storage,
            environment,
            store,
            retry,
            rate_limit,
            cors_allow_origin,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_environment_is_empty() {
        let config = ServiceConfig::from_lookup(|_| None);
        assert_eq!(config.port, 8080);
        assert_eq!(config.storage, StorageTarget::Memory);
        assert_eq!(config.environment, Environment::Development);
        assert_eq!(config.retry.attempts, 5);
        assert_eq!(config.store.operation_timeout, Duration::from_secs(5));
        assert_eq!(config.rate_limit.max_requests, 100);
        assert_eq!(config.cors_allow_origin, "*");
    }

    #[test]
    fn test_values_are_read() {
        let config = ServiceConfig::from_lookup(lookup_from(&[
            ("SERVICE_PORT", "9090"),
            ("DANGERZONE_DB_PATH", "/var/lib/zones.db"),
            ("APP_ENV", "Production"),
            ("STORE_TIMEOUT_MS", "250"),
            ("STORE_CONNECT_ATTEMPTS", "3"),
            ("STORE_CONNECT_BACKOFF_MS", "10"),
            ("RATE_LIMIT_MAX_REQUESTS", "7"),
            ("RATE_LIMIT_WINDOW_SECS", "60"),
        ]));

        assert_eq!(config.port, 9090);
        assert_eq!(
            config.storage,
            StorageTarget::Sqlite(PathBuf::from("/var/lib/zones.db"))
        );
        assert!(config.environment.is_production());
        assert_eq!(config.store.operation_timeout, Duration::from_millis(250));
        assert_eq!(config.retry.attempts, 3);
        assert_eq!(config.retry.backoff, Duration::from_millis(10));
        assert_eq!(config.rate_limit.max_requests, 7);
        assert_eq!(config.rate_limit.window, Duration::from_secs(60));
    }

    #[test]
    fn test_garbage_falls_back_to_defaults() {
        let config = ServiceConfig::from_lookup(lookup_from(&[
            ("SERVICE_PORT", "eighty"),
            ("STORE_CONNECT_ATTEMPTS", "0"),
            ("RATE_LIMIT_WINDOW_SECS", "0"),
        ]));
        assert_eq!(config.port, 8080);
        assert_eq!(config.retry.attempts, 1);
        assert_eq!(config.rate_limit.window, Duration::from_secs(900));
    }

    #[test]
    fn test_storage_target_parse() {
        assert_eq!(StorageTarget::parse("memory"), StorageTarget::Memory);
        assert_eq!(StorageTarget::parse(":memory:"), StorageTarget::Memory);
        assert_eq!(
            StorageTarget::parse("zones.db"),
            StorageTarget::Sqlite(PathBuf::from("zones.db"))
        );
    }

    #[test]
    fn test_environment_parse() {
        assert_eq!(Environment::parse("prod"), Environment::Production);
        assert_eq!(Environment::parse("staging"), Environment::Development);
    }
}
