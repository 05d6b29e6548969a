//! Collector and cache configuration

use crate::error::{CollectorError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default overall deadline for one collection call
pub const DEFAULT_COLLECT_TIMEOUT_SECS: u64 = 30;

/// Cache settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// `false` selects the no-op cache
    #[serde(default = "default_cache_enabled")]
    pub enabled: bool,

    /// Lifetime of every entry, applied at insert
    #[serde(default = "default_ttl")]
    pub ttl: Duration,

    /// Maximum number of entries; 0 means unbounded
    #[serde(default = "default_max_size")]
    pub max_size: usize,

    /// Period of the background expiry sweep
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval: Duration,
}

fn default_cache_enabled() -> bool {
    true
}

fn default_ttl() -> Duration {
    Duration::from_secs(5 * 60)
}

fn default_max_size() -> usize {
    1000
}

fn default_sweep_interval() -> Duration {
    Duration::from_secs(60)
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_cache_enabled(),
            ttl: default_ttl(),
            max_size: default_max_size(),
            sweep_interval: default_sweep_interval(),
        }
    }
}

impl CacheConfig {
    /// Caching turned off
    pub fn disabled() -> Self {
        Self { enabled: false, ..Default::default() }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_max_size(mut self, max_size: usize) -> Self {
        self.max_size = max_size;
        self
    }

    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Reject settings the memory cache cannot honour.
    pub fn validate(&self) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        if self.ttl.is_zero() {
            return Err(CollectorError::config("cache ttl must be greater than zero"));
        }
        if self.sweep_interval.is_zero() {
            return Err(CollectorError::config("cache sweep interval must be greater than zero"));
        }
        Ok(())
    }
}

/// Collector settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectorConfig {
    /// Deadline used when a request carries none, and for GPU/database queries
    #[serde(default = "default_timeout")]
    pub default_timeout: Duration,

    #[serde(default)]
    pub cache: CacheConfig,
}

fn default_timeout() -> Duration {
    Duration::from_secs(DEFAULT_COLLECT_TIMEOUT_SECS)
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self { default_timeout: default_timeout(), cache: CacheConfig::default() }
    }
}

impl CollectorConfig {
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    pub fn with_cache(mut self, cache: CacheConfig) -> Self {
        self.cache = cache;
        self
    }
}
