//! Configuration management

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_CACHE_TTL_SECS, DEFAULT_DB_POOL_SIZE, DEFAULT_REFRESH_TIMEOUT_SECS,
    DEFAULT_STORE_TIMEOUT_MS,
};
use crate::errors::{FlagError, Result};

/// Engine configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Cache lifetime and store timeouts.
    #[serde(default)]
    pub cache: CacheConfig,
    /// Background refresh.
    #[serde(default)]
    pub refresh: RefreshConfig,
    /// Backing store selection.
    #[serde(default)]
    pub database: DatabaseConfig,
}

/// Flag cache configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Lifetime of a full cache snapshot; also the refresh interval.
    pub ttl_seconds: u64,
    /// Upper bound on a single store call made while evaluating.
    pub store_timeout_ms: u64,
}

/// Background refresh configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefreshConfig {
    /// Run the periodic refresh task.
    pub enabled: bool,
    /// Upper bound on a single refresh tick.
    pub timeout_seconds: u64,
}

/// Database configuration
///
/// Without a `path` the runtime falls back to the in-memory store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite file; `None` selects the in-memory store.
    pub path: Option<String>,
    /// Maximum pooled connections.
    pub pool_size: u32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { ttl_seconds: DEFAULT_CACHE_TTL_SECS, store_timeout_ms: DEFAULT_STORE_TIMEOUT_MS }
    }
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self { enabled: true, timeout_seconds: DEFAULT_REFRESH_TIMEOUT_SECS }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { path: None, pool_size: DEFAULT_DB_POOL_SIZE }
    }
}

impl CacheConfig {
    /// `ttl_seconds` as a `Duration`.
    pub const fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }

    /// `store_timeout_ms` as a `Duration`.
    pub const fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }
}

impl RefreshConfig {
    /// `timeout_seconds` as a `Duration`.
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

impl Config {
    /// Reject values the engine cannot run with.
    ///
    /// # Errors
    /// Returns `FlagError::Config` naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        if self.cache.ttl_seconds == 0 {
            return Err(FlagError::Config("cache.ttl_seconds must be greater than zero".into()));
        }
        if self.cache.store_timeout_ms == 0 {
            return Err(FlagError::Config(
                "cache.store_timeout_ms must be greater than zero".into(),
            ));
        }
        if self.refresh.timeout_seconds == 0 {
            return Err(FlagError::Config(
                "refresh.timeout_seconds must be greater than zero".into(),
            ));
        }
        if self.database.pool_size == 0 {
            return Err(FlagError::Config("database.pool_size must be greater than zero".into()));
        }
        Ok(())
    }
}
