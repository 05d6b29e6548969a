//! Token bucket rate limiting
//!
//! Each adapter owns one [`Limiter`] and calls [`Limiter::wait`] before every
//! upstream request. Tokens are refilled lazily from elapsed time on each
//! access; there is no timer task.

use crate::config::RateLimitConfig;
use crate::error::{ProviderError, Result};
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Interval between `allow` polls inside `wait`
const POLL_INTERVAL_MS: u64 = 50;

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

/// Token bucket limiter
#[derive(Debug)]
pub struct Limiter {
    name: String,
    bucket: Mutex<Bucket>,
    max_tokens: f64,
    /// Tokens per second
    refill_rate: f64,
    timeout: Duration,
}

impl Limiter {
    /// Create a limiter that starts with a full bucket
    pub fn new(
        name: impl Into<String>,
        requests_per_second: f64,
        burst: u32,
        timeout: Duration,
    ) -> Self {
        let max_tokens = f64::from(burst);
        Self {
            name: name.into(),
            bucket: Mutex::new(Bucket { tokens: max_tokens, last_refill: Instant::now() }),
            max_tokens,
            refill_rate: requests_per_second.max(0.0),
            timeout,
        }
    }

    pub fn from_config(name: impl Into<String>, config: &RateLimitConfig) -> Self {
        Self::new(name, config.requests_per_second, config.burst, config.timeout)
    }

    /// Take one token if available. Never blocks.
    pub fn allow(&self) -> bool {
        let mut bucket = self.bucket.lock().unwrap_or_else(|e| e.into_inner());
        self.refill(&mut bucket);

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Wait until a token is available.
    ///
    /// Polls [`allow`](Self::allow) every 50ms. Fails with a rate limit error
    /// once the limiter's timeout elapses. Dropping the future abandons the
    /// wait.
    pub async fn wait(&self) -> Result<()> {
        let poll = async {
            loop {
                if self.allow() {
                    return;
                }
                tokio::time::sleep(Duration::from_millis(POLL_INTERVAL_MS)).await;
            }
        };

        tokio::time::timeout(self.timeout, poll).await.map_err(|_| {
            debug!(provider = %self.name, timeout_ms = self.timeout.as_millis() as u64, "Rate limiter wait timed out");
            ProviderError::rate_limit(
                &self.name,
                format!("no token available within {:?}", self.timeout),
            )
        })
    }

    /// Current token estimate
    pub fn available(&self) -> f64 {
        let mut bucket = self.bucket.lock().unwrap_or_else(|e| e.into_inner());
        self.refill(&mut bucket);
        bucket.tokens
    }

    /// Restore full capacity immediately
    pub fn reset(&self) {
        let mut bucket = self.bucket.lock().unwrap_or_else(|e| e.into_inner());
        bucket.tokens = self.max_tokens;
        bucket.last_refill = Instant::now();
    }

    pub fn burst(&self) -> u32 {
        self.max_tokens as u32
    }

    fn refill(&self, bucket: &mut Bucket) {
        let now = Instant::now();
        let elapsed = now.saturating_duration_since(bucket.last_refill).as_secs_f64();
        bucket.last_refill = now;
        bucket.tokens = (bucket.tokens + elapsed * self.refill_rate).min(self.max_tokens);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use tokio_test::{assert_err, assert_ok};

    #[tokio::test(start_paused = true)]
    async fn test_burst_then_deny() {
        let limiter = Limiter::new("test", 2.0, 5, Duration::from_secs(1));
        for _ in 0..5 {
            assert!(limiter.allow());
        }
        assert!(!limiter.allow());
    }

    #[tokio::test(start_paused = true)]
    async fn test_refill_after_interval() {
        let limiter = Limiter::new("test", 2.0, 1, Duration::from_secs(1));
        assert!(limiter.allow());
        assert!(!limiter.allow());

        tokio::time::advance(Duration::from_millis(500)).await;
        assert!(limiter.allow());
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokens_capped_at_burst() {
        let limiter = Limiter::new("test", 100.0, 3, Duration::from_secs(1));
        tokio::time::advance(Duration::from_secs(60)).await;
        assert_eq!(limiter.available(), 3.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_succeeds_after_refill() {
        let limiter = Limiter::new("test", 10.0, 1, Duration::from_secs(1));
        assert!(limiter.allow());
        assert_ok!(limiter.wait().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_times_out() {
        let limiter = Limiter::new("slow", 0.0, 1, Duration::from_millis(200));
        assert!(limiter.allow());

        let err = assert_err!(limiter.wait().await);
        assert_eq!(err.kind(), ErrorKind::RateLimit);
        assert_eq!(err.provider(), "slow");
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset() {
        let limiter = Limiter::new("test", 0.0, 2, Duration::from_secs(1));
        assert!(limiter.allow());
        assert!(limiter.allow());
        assert!(!limiter.allow());

        limiter.reset();
        assert_eq!(limiter.available(), 2.0);
        assert_eq!(limiter.burst(), 2);
    }

    #[test]
    fn test_from_config() {
        let config = RateLimitConfig::new(4.0, 10);
        let limiter = Limiter::from_config("cloudflare", &config);
        assert_eq!(limiter.burst(), 10);
        assert_eq!(limiter.available(), 10.0);
    }
}
