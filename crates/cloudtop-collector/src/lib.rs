//! # cloudtop Collector
//!
//! Concurrent resource collection across heterogeneous cloud providers.
//!
//! ## Architecture
//!
//! ```text
//! Registry + ProviderConfigs
//!        │ initialize_providers
//!        ▼
//! Collector ──┬── provider A ─┐
//!   │         ├── provider B ─┼── merge ──► CollectResult { results, errors }
//!   │         └── provider C ─┘
//!   └── Cache (TTL, bounded)
//! ```
//!
//! - One task per provider, all bounded by one shared deadline
//! - A failing, hanging or panicking provider costs only its own slot
//! - Fresh per-provider results are cached and served with `cached = true`
//! - [`Collector::refresh_stream`] re-runs a request on a fixed period
//!
//! See [`collector`] for the fan-out and [`cache`] for expiry and eviction.

#![warn(clippy::all)]

pub mod cache;
pub mod collector;
pub mod config;
pub mod error;
pub mod session;

#[cfg(test)]
mod testing;

// Collection
pub use collector::{CollectRequest, CollectResult, Collector, ProviderErrors, ProviderResult};

// Caching
pub use cache::{build_cache, Cache, MemoryCache, NoopCache};

// Configuration
pub use config::{CacheConfig, CollectorConfig, DEFAULT_COLLECT_TIMEOUT_SECS};

// Session lifecycle
pub use session::{close_providers, initialize_providers};

// Error handling
pub use error::{CollectorError, Result};
