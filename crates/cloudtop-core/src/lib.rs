//! cloudtop Core - Shared types and traits
//!
//! This crate defines the abstractions shared by:
//! - provider adapters (one crate or module per vendor)
//! - cloudtop-collector (fan-out, caching, merge)
//!
//! Key types:
//! - [`Provider`] trait and its capability extensions
//! - [`Registry`] of provider factories
//! - Normalized resource / GPU / database types
//! - [`ProviderError`] taxonomy
//! - [`Limiter`] (token bucket) and [`retry`] (exponential backoff)

pub mod config;
pub mod error;
pub mod metrics;
pub mod ratelimit;
pub mod registry;
pub mod retry;
pub mod traits;
pub mod types;

pub use config::*;
pub use error::*;
pub use metrics::*;
pub use ratelimit::Limiter;
pub use registry::{Factory, Registry};
pub use retry::{retry, RetryConfig};
pub use traits::*;
pub use types::*;
