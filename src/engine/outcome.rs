//! Request outcomes
//!
//! What the delta proxy cache reports alongside a served series.

use std::fmt;

use crate::engine::fast_forward::FastForwardStatus;
use crate::timeseries::{Extent, Series, TimeRangeQuery};

/// How the cache participated in a response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    /// Fully served from cache
    Hit,
    /// Cache covered part of the request
    PartialHit,
    /// No entry existed for the key
    KeyMiss,
    /// An entry existed but none of it overlapped the request
    RangeMiss,
    /// Every delta failed; cached data served as-is
    Stale,
    /// Served straight from the origin without touching the cache
    ProxyOnly,
}

impl fmt::Display for CacheStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheStatus::Hit => write!(f, "hit"),
            CacheStatus::PartialHit => write!(f, "phit"),
            CacheStatus::KeyMiss => write!(f, "kmiss"),
            CacheStatus::RangeMiss => write!(f, "rmiss"),
            CacheStatus::Stale => write!(f, "stale"),
            CacheStatus::ProxyOnly => write!(f, "proxy-only"),
        }
    }
}

/// Non-fatal conditions attached to a successful response
#[derive(Debug, Clone, PartialEq)]
pub enum Warning {
    /// Some deltas could not be fetched; their extents are absent
    PartialResult { missing: Vec<Extent> },
    /// Nothing new could be fetched; the cached portion is served
    Stale,
    /// The cache store failed and the request went straight to the origin
    CacheBypassed(String),
}

impl Warning {
    /// HTTP `Warning` header code
    pub fn code(&self) -> u16 {
        match self {
            Warning::Stale => 110,
            Warning::PartialResult { .. } | Warning::CacheBypassed(_) => 199,
        }
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::PartialResult { missing } => {
                let extents: Vec<String> = missing.iter().map(|e| e.to_string()).collect();
                write!(f, "partial result, missing extents {}", extents.join(" "))
            }
            Warning::Stale => write!(f, "Response is Stale"),
            Warning::CacheBypassed(reason) => write!(f, "cache bypassed: {}", reason),
        }
    }
}

/// A served delta proxy response
#[derive(Debug, Clone)]
pub struct DeltaResponse {
    /// Normalized query that was served
    pub query: TimeRangeQuery,
    /// Cache key of the series
    pub key: String,
    /// Visible series, trimmed to the request (plus fast-forward point)
    pub series: Series,
    pub status: CacheStatus,
    pub fast_forward: FastForwardStatus,
    /// Extents fetched from the origin for this request
    pub deltas: Vec<Extent>,
    pub warnings: Vec<Warning>,
}

impl DeltaResponse {
    /// Value of the result header
    pub fn result_header(&self) -> String {
        format!(
            "engine=DeltaProxyCache; status={}; ffstatus={}",
            self.status, self.fast_forward
        )
    }

    pub fn is_partial(&self) -> bool {
        self.warnings
            .iter()
            .any(|w| matches!(w, Warning::PartialResult { .. }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_display() {
        assert_eq!(CacheStatus::PartialHit.to_string(), "phit");
        assert_eq!(CacheStatus::ProxyOnly.to_string(), "proxy-only");
    }

    #[test]
    fn test_warning_codes() {
        assert_eq!(Warning::Stale.code(), 110);
        let partial = Warning::PartialResult {
            missing: vec![Extent::new(0, 90)],
        };
        assert_eq!(partial.code(), 199);
        assert_eq!(partial.to_string(), "partial result, missing extents [0, 90]");
    }

    #[test]
    fn test_result_header() {
        let response = DeltaResponse {
            query: TimeRangeQuery::try_new("q", Extent::new(0, 10), 10).unwrap(),
            key: "k".to_string(),
            series: Series::new(),
            status: CacheStatus::Hit,
            fast_forward: FastForwardStatus::Off,
            deltas: Vec::new(),
            warnings: Vec::new(),
        };

        assert_eq!(
            response.result_header(),
            "engine=DeltaProxyCache; status=hit; ffstatus=off"
        );
        assert!(!response.is_partial());
    }
}
