//! # Delta Proxy
//!
//! A caching reverse proxy for time-series backends. Range queries are
//! answered from a per-series cache, and only the missing extents (deltas)
//! are fetched from the origin and merged in.
//!
//! ## Features
//!
//! - **Delta fetching**: Only uncached extents go upstream, concurrently
//! - **Graceful degradation**: Partial and stale responses instead of errors
//! - **Fast-forward**: Fresh value for the still-open step on every request
//! - **Per-key locking**: Concurrent merges for one series never lose data
//!
//! ## Modules
//!
//! - [`timeseries`]: Extents, series, delta computation and merging
//! - [`cache`]: Cache entry store and key derivation
//! - [`origin`]: Backend dialects and origin clients
//! - [`engine`]: The delta proxy cache orchestrator
//! - [`api`]: HTTP server with Axum
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use deltaproxy::cache::{MemoryCache, MemoryCacheConfig};
//! use deltaproxy::engine::{DeltaProxyCache, EngineConfig};
//! use deltaproxy::origin::{HttpOrigin, HttpOriginConfig, IronDbBackend, UpstreamRequest};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let backend = Arc::new(IronDbBackend::new());
//!     let origin = Arc::new(HttpOrigin::new(HttpOriginConfig::default(), backend.clone())?);
//!     let cache = Arc::new(MemoryCache::new(MemoryCacheConfig::default()));
//!     let engine = DeltaProxyCache::new(backend, origin, cache, EngineConfig::default());
//!
//!     let request = UpstreamRequest::new("/rollup/00000000-0000-0000-0000-000000000001/cpu")
//!         .param("start_ts", "1700000000")
//!         .param("end_ts", "1700003600")
//!         .param("rollup_span", "60s");
//!
//!     let response = engine.handle(&request, true).await?;
//!     println!("{} points ({})", response.series.len(), response.result_header());
//!
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod cache;
pub mod config;
pub mod engine;
pub mod origin;
pub mod timeseries;

// Re-export top-level types for convenience
pub use timeseries::{Extent, Point, Series, TimeRangeQuery};

pub use cache::{CacheEntry, CacheError, CacheStore, MemoryCache};

pub use origin::{Backend, Codec, OriginError, OriginFetcher, UpstreamRequest};

pub use engine::{CacheStatus, DeltaProxyCache, DeltaResponse, EngineConfig, ProxyError};

pub use api::{build_router, serve, ApiConfig, ApiError, AppState};

pub use config::{Config, ConfigError, LoggingConfig};
