//! Error types for cloudtop providers
//!
//! Adapters classify their own failures into [`ProviderError`]. The collector
//! never interprets the kind; it records whichever error a provider produced
//! against that provider's slot.

use std::time::Duration;
use thiserror::Error;

/// Result type for provider operations
pub type Result<T> = std::result::Result<T, ProviderError>;

/// Coarse classification of a provider failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Auth,
    Permission,
    Network,
    RateLimit,
    NotFound,
    Validation,
    Internal,
    DeadlineExceeded,
    NotRegistered,
}

/// Error raised by a provider adapter or on its behalf
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    /// Credentials invalid or missing
    #[error("[{provider}] authentication failed: {message}")]
    Auth { provider: String, message: String },

    /// Credentials valid but not allowed
    #[error("[{provider}] permission denied: {message}")]
    Permission { provider: String, message: String },

    /// Transport failure or upstream 5xx
    #[error("[{provider}] network error: {message}")]
    Network { provider: String, message: String },

    /// Upstream or local rate limit
    #[error("[{provider}] rate limit exceeded: {message}")]
    RateLimit { provider: String, message: String },

    /// Requested resource does not exist
    #[error("[{provider}] resource not found: {resource}")]
    NotFound { provider: String, resource: String },

    /// Bad configuration or request
    #[error("[{provider}] {message}")]
    Validation { provider: String, message: String },

    /// Anything unexpected (decode failures, panics)
    #[error("[{provider}] internal error: {message}")]
    Internal { provider: String, message: String },

    /// The collection deadline fired before the provider answered
    #[error("[{provider}] deadline exceeded after {elapsed:?}")]
    DeadlineExceeded { provider: String, elapsed: Duration },

    /// No factory registered under this name
    #[error("provider {0} not registered")]
    NotRegistered(String),
}

impl ProviderError {
    /// Create an authentication error
    pub fn auth(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Auth { provider: provider.into(), message: message.into() }
    }

    /// Create a permission error
    pub fn permission(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Permission { provider: provider.into(), message: message.into() }
    }

    /// Create a network error
    pub fn network(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Network { provider: provider.into(), message: message.into() }
    }

    /// Create a rate limit error
    pub fn rate_limit(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::RateLimit { provider: provider.into(), message: message.into() }
    }

    /// Create a not-found error
    pub fn not_found(provider: impl Into<String>, resource: impl Into<String>) -> Self {
        Self::NotFound { provider: provider.into(), resource: resource.into() }
    }

    /// Create a validation error
    pub fn validation(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation { provider: provider.into(), message: message.into() }
    }

    /// Create an internal error
    pub fn internal(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Internal { provider: provider.into(), message: message.into() }
    }

    /// Classify an HTTP status returned by an upstream API.
    ///
    /// 401 maps to auth, 403 to permission, 404 to not-found, 429 to rate
    /// limit, other 4xx to validation and everything else to network.
    pub fn from_status(
        provider: impl Into<String>,
        status: reqwest::StatusCode,
        body: &str,
    ) -> Self {
        let provider = provider.into();
        let message = format!("API error {}: {}", status.as_u16(), body);
        match status {
            reqwest::StatusCode::UNAUTHORIZED => Self::auth(provider, message),
            reqwest::StatusCode::FORBIDDEN => Self::permission(provider, message),
            reqwest::StatusCode::NOT_FOUND => Self::not_found(provider, body),
            reqwest::StatusCode::TOO_MANY_REQUESTS => Self::rate_limit(provider, message),
            s if s.is_client_error() => Self::validation(provider, message),
            _ => Self::network(provider, message),
        }
    }

    /// Classify a `reqwest` transport error.
    pub fn from_http(provider: impl Into<String>, err: &reqwest::Error) -> Self {
        let provider = provider.into();
        if let Some(status) = err.status() {
            return Self::from_status(provider, status, &err.to_string());
        }
        if err.is_decode() || err.is_builder() {
            return Self::internal(provider, err.to_string());
        }
        Self::network(provider, err.to_string())
    }

    /// Kind of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Auth { .. } => ErrorKind::Auth,
            Self::Permission { .. } => ErrorKind::Permission,
            Self::Network { .. } => ErrorKind::Network,
            Self::RateLimit { .. } => ErrorKind::RateLimit,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Validation { .. } => ErrorKind::Validation,
            Self::Internal { .. } => ErrorKind::Internal,
            Self::DeadlineExceeded { .. } => ErrorKind::DeadlineExceeded,
            Self::NotRegistered(_) => ErrorKind::NotRegistered,
        }
    }

    /// Name of the provider the error is attributed to
    pub fn provider(&self) -> &str {
        match self {
            Self::Auth { provider, .. }
            | Self::Permission { provider, .. }
            | Self::Network { provider, .. }
            | Self::RateLimit { provider, .. }
            | Self::NotFound { provider, .. }
            | Self::Validation { provider, .. }
            | Self::Internal { provider, .. }
            | Self::DeadlineExceeded { provider, .. } => provider,
            Self::NotRegistered(provider) => provider,
        }
    }

    pub fn is_auth(&self) -> bool {
        self.kind() == ErrorKind::Auth
    }

    pub fn is_rate_limit(&self) -> bool {
        self.kind() == ErrorKind::RateLimit
    }
}

/// Errors that may declare themselves worth another attempt.
///
/// Consulted by [`crate::retry::retry`].
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

impl Retryable for ProviderError {
    fn is_retryable(&self) -> bool {
        matches!(self.kind(), ErrorKind::Network | ErrorKind::RateLimit)
    }
}

/// Decides whether a caller should keep going after a provider error
#[derive(Debug, Clone, Copy, Default)]
pub struct ErrorPolicy {
    /// Continue past transient and unknown failures with partial data
    pub degrade_gracefully: bool,
}

impl ErrorPolicy {
    pub fn new(degrade_gracefully: bool) -> Self {
        Self { degrade_gracefully }
    }

    /// Returns true if processing may continue after `err`.
    pub fn should_continue(&self, err: &ProviderError) -> bool {
        match err.kind() {
            ErrorKind::Auth | ErrorKind::Permission => false,
            ErrorKind::NotFound => true,
            _ => self.degrade_gracefully,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_retryable_kinds() {
        assert!(ProviderError::network("neon", "connection reset").is_retryable());
        assert!(ProviderError::rate_limit("neon", "429").is_retryable());
        assert!(!ProviderError::auth("neon", "bad token").is_retryable());
        assert!(!ProviderError::validation("neon", "missing account_id").is_retryable());
        assert!(!ProviderError::internal("neon", "bad json").is_retryable());
    }

    #[test]
    fn test_from_status_classification() {
        let cases = [
            (StatusCode::UNAUTHORIZED, ErrorKind::Auth),
            (StatusCode::FORBIDDEN, ErrorKind::Permission),
            (StatusCode::NOT_FOUND, ErrorKind::NotFound),
            (StatusCode::TOO_MANY_REQUESTS, ErrorKind::RateLimit),
            (StatusCode::BAD_REQUEST, ErrorKind::Validation),
            (StatusCode::BAD_GATEWAY, ErrorKind::Network),
        ];
        for (status, kind) in cases {
            assert_eq!(ProviderError::from_status("vastai", status, "").kind(), kind);
        }
    }

    #[test]
    fn test_display_includes_provider() {
        let err = ProviderError::network("runpod", "connection refused");
        assert_eq!(err.to_string(), "[runpod] network error: connection refused");
        assert_eq!(err.provider(), "runpod");

        let err = ProviderError::NotRegistered("oracle".to_string());
        assert_eq!(err.to_string(), "provider oracle not registered");
    }

    #[test]
    fn test_error_policy() {
        let strict = ErrorPolicy::new(false);
        let lenient = ErrorPolicy::new(true);

        let auth = ProviderError::auth("gcp", "expired");
        assert!(!strict.should_continue(&auth));
        assert!(!lenient.should_continue(&auth));

        let missing = ProviderError::not_found("gcp", "vm-1");
        assert!(strict.should_continue(&missing));

        let net = ProviderError::network("gcp", "timeout");
        assert!(!strict.should_continue(&net));
        assert!(lenient.should_continue(&net));
    }
}
