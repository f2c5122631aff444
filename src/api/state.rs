//! Application State
//!
//! Shared state accessible by all API handlers.
//! Wrapped in Arc for thread-safe sharing across async tasks.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::cache::CacheStore;
use crate::engine::DeltaProxyCache;
use crate::origin::OriginFetcher;

/// Shared application state for all handlers
#[derive(Clone)]
pub struct AppState {
    /// Delta proxy cache serving rollup requests
    pub engine: Arc<DeltaProxyCache>,
    /// Origin used for pass-through requests
    pub origin: Arc<dyn OriginFetcher>,
    /// Cache store, for health and stats
    pub cache: Arc<dyn CacheStore>,
    /// API configuration
    pub config: Arc<ApiConfig>,
    /// Server start time for uptime tracking
    pub start_time: Instant,
}

impl AppState {
    pub fn new(
        engine: Arc<DeltaProxyCache>,
        origin: Arc<dyn OriginFetcher>,
        cache: Arc<dyn CacheStore>,
        config: ApiConfig,
    ) -> Self {
        Self {
            engine,
            origin,
            cache,
            config: Arc::new(config),
            start_time: Instant::now(),
        }
    }

    /// Get server uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

/// API server configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Whole-request deadline in milliseconds
    pub request_timeout_ms: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8480,
            request_timeout_ms: 60_000,
        }
    }
}

impl ApiConfig {
    /// Create config with custom host and port
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    /// Get the socket address string
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}
