//! Engine error types
//!
//! Request-fatal and non-fatal conditions of the delta proxy cache.

use thiserror::Error;

use crate::timeseries::Extent;

/// Errors that can occur while serving a delta proxy request
#[derive(Error, Debug)]
pub enum ProxyError {
    /// A required range parameter is absent
    #[error("Missing URL parameter: {0}")]
    MissingParameter(String),

    /// A range parameter could not be parsed
    #[error("Invalid value for parameter {name}: {value}")]
    InvalidParameter { name: String, value: String },

    /// Start is after end
    #[error("Invalid time range: start must not be after end")]
    InvalidRange,

    /// One delta fetch failed; handled per the partial-failure policy
    #[error("Upstream fetch failed for extent {extent}: {reason}")]
    UpstreamFetchFailed { extent: Extent, reason: String },

    /// Every fetch failed and nothing usable is cached
    #[error("Upstream unavailable")]
    UpstreamUnavailable,

    /// The cache store failed; the request falls back to the origin
    #[error("Cache store unavailable: {0}")]
    CacheStoreUnavailable(String),

    /// The whole-request deadline elapsed
    #[error("Request deadline exceeded")]
    DeadlineExceeded,

    /// The merged series could not be encoded for the client
    #[error("Encode error: {0}")]
    Encode(String),
}

impl ProxyError {
    /// Whether the error comes from bad client input
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ProxyError::MissingParameter(_)
                | ProxyError::InvalidParameter { .. }
                | ProxyError::InvalidRange
        )
    }
}

/// Result type for engine operations
pub type ProxyResult<T> = Result<T, ProxyError>;
