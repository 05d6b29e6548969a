//! Error types for the collector

use cloudtop_core::ProviderError;
use thiserror::Error;

/// Collector result type
pub type Result<T> = std::result::Result<T, CollectorError>;

/// Structural failures of a collection call.
///
/// Individual provider failures never surface here; they land in
/// `CollectResult::errors`.
#[derive(Error, Debug)]
pub enum CollectorError {
    /// Malformed collection request
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Provider error outside a per-provider slot (session setup)
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

impl CollectorError {
    /// Create an invalid request error
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}
