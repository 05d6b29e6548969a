//! Per-provider configuration handed to [`Provider::initialize`]
//!
//! [`Provider::initialize`]: crate::traits::Provider::initialize

use crate::error::{ProviderError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Token-bucket parameters for one provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Sustained refill rate
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: f64,

    /// Bucket capacity
    #[serde(default = "default_burst")]
    pub burst: u32,

    /// Upper bound on how long `Limiter::wait` may block
    #[serde(default = "default_wait_timeout")]
    pub timeout: Duration,
}

fn default_requests_per_second() -> f64 {
    10.0
}

fn default_burst() -> u32 {
    20
}

fn default_wait_timeout() -> Duration {
    Duration::from_secs(30)
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: default_requests_per_second(),
            burst: default_burst(),
            timeout: default_wait_timeout(),
        }
    }
}

impl RateLimitConfig {
    pub fn new(requests_per_second: f64, burst: u32) -> Self {
        Self { requests_per_second, burst, ..Default::default() }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Configuration for a single provider instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Registry name of the provider
    pub name: String,

    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Resolved credentials (`api_token`, `api_secret`, `key_file`, ...)
    #[serde(default)]
    pub credentials: HashMap<String, String>,

    /// Adapter specific options (`account_id`, `project_id`, ...)
    #[serde(default)]
    pub options: HashMap<String, serde_json::Value>,

    /// Overrides the adapter's default rate limit
    #[serde(default)]
    pub rate_limit: Option<RateLimitConfig>,
}

fn default_enabled() -> bool {
    true
}

impl ProviderConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            enabled: default_enabled(),
            credentials: HashMap::new(),
            options: HashMap::new(),
            rate_limit: None,
        }
    }

    pub fn with_credential(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.credentials.insert(key.into(), value.into());
        self
    }

    pub fn with_option(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.options.insert(key.into(), value);
        self
    }

    pub fn with_rate_limit(mut self, rate_limit: RateLimitConfig) -> Self {
        self.rate_limit = Some(rate_limit);
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Fetch a non-empty credential or fail with an authentication error.
    pub fn require_credential(&self, key: &str) -> Result<&str> {
        match self.credentials.get(key) {
            Some(v) if !v.is_empty() => Ok(v.as_str()),
            _ => Err(ProviderError::auth(&self.name, format!("missing {}", key))),
        }
    }

    /// Fetch a non-empty string option or fail with a validation error.
    pub fn require_option(&self, key: &str) -> Result<&str> {
        self.option_str(key)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ProviderError::validation(&self.name, format!("missing option {}", key)))
    }

    pub fn option_str(&self, key: &str) -> Option<&str> {
        self.options.get(key).and_then(|v| v.as_str())
    }

    /// The configured rate limit, or the adapter-wide default
    pub fn rate_limit_or_default(&self) -> RateLimitConfig {
        self.rate_limit.clone().unwrap_or_default()
    }
}
