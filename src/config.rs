//! Runtime configuration
//!
//! Loaded from the process environment (and a `.env` file when present).

use crate::error::{GlodapError, Result};
use std::time::Duration;

/// Connection pool sizing for the data store
#[derive(Debug, Clone, PartialEq)]
pub struct PoolSettings {
    /// Connections kept for steady-state load
    pub pool_size: u32,
    /// Extra connections allowed under burst, reaped when idle
    pub max_overflow: u32,
    /// How long an acquire may block before failing
    pub acquire_timeout: Duration,
    /// Connections are recycled after this lifetime
    pub recycle: Duration,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            pool_size: 20,
            max_overflow: 5,
            acquire_timeout: Duration::from_secs(30),
            recycle: Duration::from_secs(1800),
        }
    }
}

impl PoolSettings {
    pub fn max_connections(&self) -> u32 {
        self.pool_size + self.max_overflow
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    /// Public base URL the API is served under (informational)
    pub app_host: Option<String>,
    pub bind_addr: String,
    pub pool: PoolSettings,
}

impl AppConfig {
    /// Load configuration from environment variables, reading `.env` first.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = match lookup("DATABASE_URL") {
            Some(url) => url,
            None => {
                let required = |key: &str| {
                    lookup(key).ok_or_else(|| {
                        GlodapError::Config(format!("missing environment variable {}", key))
                    })
                };
                let user = required("DBUSER")?;
                let pass = required("DBPASS")?;
                let host = required("DBHOST")?;
                let name = required("DBNAME")?;
                let port = lookup("DBPORT").unwrap_or_else(|| "5432".to_string());
                format!("postgres://{}:{}@{}:{}/{}", user, pass, host, port, name)
            }
        };

        let defaults = PoolSettings::default();
        let pool = PoolSettings {
            pool_size: parse_or(&lookup, "DB_POOL_SIZE", defaults.pool_size)?,
            max_overflow: parse_or(&lookup, "DB_MAX_OVERFLOW", defaults.max_overflow)?,
            acquire_timeout: Duration::from_secs(parse_or(
                &lookup,
                "DB_POOL_TIMEOUT_SECS",
                defaults.acquire_timeout.as_secs(),
            )?),
            recycle: Duration::from_secs(parse_or(
                &lookup,
                "DB_POOL_RECYCLE_SECS",
                defaults.recycle.as_secs(),
            )?),
        };

        Ok(Self {
            database_url,
            app_host: lookup("APPHOST"),
            bind_addr: lookup("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:8080".to_string()),
            pool,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| GlodapError::Config(format!("invalid value for {}: {}", key, raw))),
        None => Ok(default),
    }
}
