//! Origin Access
//!
//! Everything backend-specific lives behind two seams:
//!
//! - [`Backend`]: parses inbound range parameters, rewrites outbound range
//!   parameters for an extent, and encodes/decodes series ([`Codec`])
//! - [`OriginFetcher`]: performs the fetch for a request and extent
//!
//! The delta proxy cache only ever sees [`TimeRangeQuery`], [`Extent`] and
//! [`Series`].
//!
//! ## Implementations
//!
//! - **http**: reqwest-based origin client
//! - **irondb**: IRONdb rollup API dialect

mod http;
mod irondb;

pub use http::{HttpOrigin, HttpOriginConfig};
pub use irondb::IronDbBackend;

use async_trait::async_trait;
use thiserror::Error;

use crate::engine::ProxyError;
use crate::timeseries::{Extent, Series, TimeRangeQuery};

/// Backend-neutral outbound request: a path and its query parameters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpstreamRequest {
    pub path: String,
    pub params: Vec<(String, String)>,
}

impl UpstreamRequest {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            params: Vec::new(),
        }
    }

    /// Builder: append a parameter
    pub fn param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((name.into(), value.into()));
        self
    }

    /// First value of a parameter
    pub fn get(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Replace all values of a parameter with one value
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        self.params.retain(|(k, _)| k != name);
        self.params.push((name.to_string(), value.into()));
    }

    /// Remove a parameter, returning its first value
    pub fn remove(&mut self, name: &str) -> Option<String> {
        let value = self.get(name).map(str::to_string);
        self.params.retain(|(k, _)| k != name);
        value
    }
}

/// Raw origin response for pass-through requests
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

/// Series wire encoding of a backend
pub trait Codec: Send + Sync {
    fn decode(&self, raw: &[u8]) -> Result<Series, OriginError>;

    fn encode(&self, series: &Series) -> Result<Vec<u8>, OriginError>;

    fn content_type(&self) -> &'static str {
        "application/json"
    }
}

/// A backend API dialect
pub trait Backend: Codec {
    /// Identifier used in cache keys and logs
    fn name(&self) -> &str;

    /// Extract a normalized query from an inbound request
    fn parse_time_range_query(&self, request: &UpstreamRequest)
        -> Result<TimeRangeQuery, ProxyError>;

    /// Rewrite the range parameters of an outbound request to an extent
    fn set_extent(&self, request: &mut UpstreamRequest, query: &TimeRangeQuery, extent: &Extent);

    /// Outbound request for the fast-forward window
    fn fast_forward_request(
        &self,
        request: &UpstreamRequest,
        query: &TimeRangeQuery,
        window: &Extent,
    ) -> UpstreamRequest {
        let mut ff = request.clone();
        self.set_extent(&mut ff, query, window);
        ff
    }
}

/// Performs origin fetches
#[async_trait]
pub trait OriginFetcher: Send + Sync {
    /// Fetch `extent` of `query`; `request` already targets that extent
    async fn fetch(
        &self,
        request: &UpstreamRequest,
        query: &TimeRangeQuery,
        extent: &Extent,
    ) -> Result<Series, OriginError>;

    /// Forward a request unchanged
    async fn forward(&self, request: &UpstreamRequest) -> Result<RawResponse, OriginError> {
        Err(OriginError::Unsupported(request.path.clone()))
    }
}

/// Errors that can occur when talking to the origin
#[derive(Error, Debug)]
pub enum OriginError {
    #[error("Origin unavailable")]
    Unavailable,

    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Origin returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Request timeout")]
    Timeout,

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Encode error: {0}")]
    Encode(String),

    #[error("Unsupported request: {0}")]
    Unsupported(String),
}
