//! Result caching
//!
//! The collector stores every fresh `ProviderResult` under a key derived from
//! the provider name and the request shape, and serves repeated requests from
//! the cache until the entry expires.
//!
//! Two implementations sit behind [`Cache`]:
//! - [`MemoryCache`]: TTL + bounded size, with a background expiry sweep
//! - [`NoopCache`]: always misses (caching disabled)

use crate::config::CacheConfig;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::{Arc, RwLock, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

/// Key/value cache contract
pub trait Cache<V>: Send + Sync {
    /// Value for `key`, or `None` if absent or expired
    fn get(&self, key: &str) -> Option<V>;

    fn set(&self, key: &str, value: V);

    fn delete(&self, key: &str);

    fn clear(&self);

    /// Number of stored entries, including expired ones not yet swept
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Build the cache selected by `config`
pub fn build_cache<V>(config: &CacheConfig) -> Arc<dyn Cache<V>>
where
    V: Clone + Send + Sync + 'static,
{
    if config.enabled {
        Arc::new(MemoryCache::with_sweep_interval(
            config.ttl,
            config.max_size,
            config.sweep_interval,
        ))
    } else {
        Arc::new(NoopCache::new())
    }
}

/// Stand-in for "never" when `now + duration` overflows the clock
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

/// `now + duration`, saturating at a far-future instant
pub(crate) fn instant_after(now: Instant, duration: Duration) -> Instant {
    now.checked_add(duration).unwrap_or_else(|| now + FAR_FUTURE)
}

struct Entry<V> {
    value: V,
    expires_at: Instant,
}

impl<V> Entry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

type Entries<V> = RwLock<HashMap<String, Entry<V>>>;

/// In-memory TTL cache
///
/// Every entry gets the same TTL at insert. When a new key arrives at
/// capacity, expired entries are evicted first, then the entry closest to
/// expiry. A background task sweeps expired entries every `sweep_interval`
/// and exits once the cache is dropped.
pub struct MemoryCache<V> {
    entries: Arc<Entries<V>>,
    ttl: Duration,
    max_size: usize,
    sweeper: Option<JoinHandle<()>>,
}

impl<V> MemoryCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Create a cache with a one-minute sweep interval
    pub fn new(ttl: Duration, max_size: usize) -> Self {
        Self::with_sweep_interval(ttl, max_size, Duration::from_secs(60))
    }

    /// Create a cache with a custom sweep interval.
    ///
    /// The sweep task is spawned on the current tokio runtime. Outside a
    /// runtime no sweep runs; expired entries are still never returned and are
    /// evicted on insert.
    pub fn with_sweep_interval(ttl: Duration, max_size: usize, sweep_interval: Duration) -> Self {
        let entries: Arc<Entries<V>> = Arc::new(RwLock::new(HashMap::new()));

        let sweeper = match tokio::runtime::Handle::try_current() {
            Ok(handle) if !sweep_interval.is_zero() => {
                Some(handle.spawn(sweep_loop(Arc::downgrade(&entries), sweep_interval)))
            }
            _ => {
                debug!("No tokio runtime, cache sweep disabled");
                None
            }
        };

        Self { entries, ttl, max_size, sweeper }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Remove expired entries now; returns how many were removed
    pub fn sweep_expired(&self) -> usize {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        remove_expired(&mut entries, Instant::now())
    }
}

impl<V> Cache<V> for MemoryCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn get(&self, key: &str) -> Option<V> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries
            .get(key)
            .filter(|entry| !entry.is_expired(Instant::now()))
            .map(|entry| entry.value.clone())
    }

    fn set(&self, key: &str, value: V) {
        let now = Instant::now();
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());

        if self.max_size > 0 && !entries.contains_key(key) && entries.len() >= self.max_size {
            evict(&mut entries, self.max_size, now);
        }

        entries.insert(key.to_string(), Entry { value, expires_at: instant_after(now, self.ttl) });
    }

    fn delete(&self, key: &str) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.remove(key);
    }

    fn clear(&self) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.clear();
    }

    fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }
}

impl<V> Drop for MemoryCache<V> {
    fn drop(&mut self) {
        if let Some(sweeper) = self.sweeper.take() {
            sweeper.abort();
        }
    }
}

/// Make room for one insert: drop expired entries, then the nearest expiry.
fn evict<V>(entries: &mut HashMap<String, Entry<V>>, max_size: usize, now: Instant) {
    let expired = remove_expired(entries, now);

    if entries.len() >= max_size {
        let nearest = entries
            .iter()
            .min_by_key(|(_, entry)| entry.expires_at)
            .map(|(key, _)| key.clone());
        if let Some(key) = nearest {
            entries.remove(&key);
        }
    }

    debug!(expired, remaining = entries.len(), "Evicted cache entries");
}

fn remove_expired<V>(entries: &mut HashMap<String, Entry<V>>, now: Instant) -> usize {
    let before = entries.len();
    entries.retain(|_, entry| !entry.is_expired(now));
    before - entries.len()
}

async fn sweep_loop<V>(entries: Weak<Entries<V>>, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    // First tick completes immediately.
    ticker.tick().await;

    loop {
        ticker.tick().await;

        let Some(cache) = entries.upgrade() else {
            break;
        };
        let removed = {
            let mut guard = cache.write().unwrap_or_else(|e| e.into_inner());
            remove_expired(&mut guard, Instant::now())
        };
        if removed > 0 {
            debug!(removed, "Swept expired cache entries");
        }
    }
}

/// Cache that stores nothing
pub struct NoopCache<V> {
    _marker: PhantomData<fn() -> V>,
}

impl<V> NoopCache<V> {
    pub fn new() -> Self {
        Self { _marker: PhantomData }
    }
}

impl<V> Default for NoopCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> Cache<V> for NoopCache<V> {
    fn get(&self, _key: &str) -> Option<V> {
        None
    }

    fn set(&self, _key: &str, _value: V) {}

    fn delete(&self, _key: &str) {}

    fn clear(&self) {}

    fn len(&self) -> usize {
        0
    }
}
