//! Exponential backoff with jitter
//!
//! Adapters wrap individual upstream calls in [`retry`]. The operation is
//! responsible for its own idempotency. Errors decide whether they are worth
//! another attempt through [`Retryable`].
//!
//! ## Cancellation
//!
//! The future returned by [`retry`] can be dropped at any await point, during
//! the operation as well as during the backoff sleep. Bound it with
//! `tokio::time::timeout` to impose a deadline.

use crate::error::Retryable;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Retry parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Retries after the first attempt; total attempts = `max_retries + 1`
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_initial_interval")]
    pub initial_interval: Duration,

    #[serde(default = "default_max_interval")]
    pub max_interval: Duration,

    #[serde(default = "default_multiplier")]
    pub multiplier: f64,

    /// Fraction of the backoff added or removed at random (0.0-1.0)
    #[serde(default = "default_jitter")]
    pub jitter: f64,
}

fn default_max_retries() -> u32 {
    3
}

fn default_initial_interval() -> Duration {
    Duration::from_secs(1)
}

fn default_max_interval() -> Duration {
    Duration::from_secs(30)
}

fn default_multiplier() -> f64 {
    2.0
}

fn default_jitter() -> f64 {
    0.1
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_interval: default_initial_interval(),
            max_interval: default_max_interval(),
            multiplier: default_multiplier(),
            jitter: default_jitter(),
        }
    }
}

impl RetryConfig {
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_intervals(mut self, initial: Duration, max: Duration) -> Self {
        self.initial_interval = initial;
        self.max_interval = max;
        self
    }

    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter.clamp(0.0, 1.0);
        self
    }

    /// Backoff before retry number `attempt + 1`:
    /// `min(initial * multiplier^attempt, max)`, then `± backoff * jitter`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = i32::try_from(attempt).unwrap_or(i32::MAX);
        let base = self.initial_interval.as_secs_f64() * self.multiplier.powi(exp);
        let mut backoff = base.min(self.max_interval.as_secs_f64());

        // Fields are public, so jitter may bypass `with_jitter`.
        let jitter = if self.jitter.is_finite() { self.jitter.clamp(0.0, 1.0) } else { 0.0 };
        if jitter > 0.0 && backoff.is_finite() && backoff > 0.0 {
            let range = backoff * jitter;
            backoff += rand::thread_rng().gen_range(-range..=range);
        }

        Duration::try_from_secs_f64(backoff.max(0.0)).unwrap_or(self.max_interval)
    }
}

/// Run `operation` until it succeeds, returns a non-retryable error, or the
/// attempts are exhausted. Returns the last error in the latter case.
pub async fn retry<T, E, F, Fut>(config: &RetryConfig, mut operation: F) -> Result<T, E>
where
    E: Retryable + std::fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 0;
    loop {
        let err = match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        if !err.is_retryable() || attempt >= config.max_retries {
            return Err(err);
        }

        let delay = config.backoff(attempt);
        debug!(
            attempt = attempt + 1,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "Retrying after backoff"
        );
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}
