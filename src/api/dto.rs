//! Data Transfer Objects
//!
//! Response types for the non-proxied endpoints. Proxied responses use the
//! backend's own wire format.

use serde::Serialize;

/// Full health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Overall status: healthy, degraded
    pub status: String,
    /// Cache store status
    pub cache: String,
    /// Backend dialect served on /rollup
    pub backend: String,
    pub cache_entries: usize,
    pub cache_hits: u64,
    pub cache_misses: u64,
    /// Server uptime in seconds
    pub uptime_seconds: u64,
    /// Application version
    pub version: String,
}
