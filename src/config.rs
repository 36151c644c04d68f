// Runtime configuration read from the environment

use crate::pagination::QuerySettings;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

pub const APP_NAME: &str = "hospital-revenue";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Used when `RUST_LOG` is unset or invalid
pub const DEFAULT_LOG_FILTER: &str = "hospital_revenue=info,revenue_server=info,tower_http=warn";

pub const DEFAULT_DB_PATH: &str = "data/hospitals.db";
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3001";
pub const DEFAULT_QUERY_TIMEOUT_MS: u64 = 30_000;

pub const ENV_DB_PATH: &str = "REVENUE_DB_PATH";
pub const ENV_BIND_ADDR: &str = "REVENUE_BIND_ADDR";
pub const ENV_QUERY_TIMEOUT_MS: &str = "REVENUE_QUERY_TIMEOUT_MS";
pub const ENV_MAX_LIMIT: &str = "REVENUE_MAX_LIMIT";

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub db_path: PathBuf,
    pub bind_addr: String,
    pub query_timeout: Duration,
    pub query: QuerySettings,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            query_timeout: Duration::from_millis(DEFAULT_QUERY_TIMEOUT_MS),
            query: QuerySettings::default(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Unparseable values keep the default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Config::default();

        if let Some(path) = lookup(ENV_DB_PATH).filter(|v| !v.trim().is_empty()) {
            config.db_path = PathBuf::from(path);
        }
        if let Some(addr) = lookup(ENV_BIND_ADDR).filter(|v| !v.trim().is_empty()) {
            config.bind_addr = addr;
        }
        if let Some(ms) = parsed::<u64>(&lookup, ENV_QUERY_TIMEOUT_MS) {
            config.query_timeout = Duration::from_millis(ms);
        }
        if let Some(max) = parsed::<u32>(&lookup, ENV_MAX_LIMIT).filter(|m| *m > 0) {
            config.query.max_limit = max;
        }

        config
    }
}

fn parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(key, value = %raw, "ignoring unparseable setting");
            None
        }
    }
}

/// Install the fmt subscriber. `RUST_LOG` wins over `DEFAULT_LOG_FILTER`.
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();
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
    fn test_defaults_without_environment() {
        let config = Config::from_lookup(|_| None);
        assert_eq!(config, Config::default());
        assert_eq!(config.bind_addr, "0.0.0.0:3001");
        assert_eq!(config.query.record_limit, 100);
        assert_eq!(config.query.trend_limit, 36);
    }

    #[test]
    fn test_overrides_from_environment() {
        let config = Config::from_lookup(lookup_from(&[
            (ENV_DB_PATH, "/tmp/revenue.db"),
            (ENV_BIND_ADDR, "127.0.0.1:8080"),
            (ENV_QUERY_TIMEOUT_MS, "250"),
            (ENV_MAX_LIMIT, "50"),
        ]));

        assert_eq!(config.db_path, PathBuf::from("/tmp/revenue.db"));
        assert_eq!(config.bind_addr, "127.0.0.1:8080");
        assert_eq!(config.query_timeout, Duration::from_millis(250));
        assert_eq!(config.query.max_limit, 50);
    }

    #[test]
    fn test_bad_values_keep_defaults() {
        let config = Config::from_lookup(lookup_from(&[
            (ENV_QUERY_TIMEOUT_MS, "soon"),
            (ENV_MAX_LIMIT, "0"),
        ]));

        assert_eq!(config.query_timeout, Duration::from_millis(DEFAULT_QUERY_TIMEOUT_MS));
        assert_eq!(config.query.max_limit, crate::pagination::DEFAULT_MAX_LIMIT);
    }
}
