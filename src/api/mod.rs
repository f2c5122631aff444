//! Delta Proxy HTTP API
//!
//! HTTP layer in front of the delta proxy cache, built with Axum.
//!
//! # Endpoints
//!
//! ## Rollup
//! - `GET /rollup/*path` - IRONdb rollup query served through the cache
//!
//! ## Health
//! - `GET /health/live` - Liveness probe
//! - `GET /health/ready` - Readiness probe
//! - `GET /health` - Full health status
//!
//! ## Pass-through
//! - Any other path is forwarded to the origin without caching
//!
//! # Example
//!
//! ```rust,ignore
//! use deltaproxy::api::{serve, ApiConfig, AppState};
//! use deltaproxy::cache::{MemoryCache, MemoryCacheConfig};
//! use deltaproxy::engine::{DeltaProxyCache, EngineConfig};
//! use deltaproxy::origin::{HttpOrigin, HttpOriginConfig, IronDbBackend};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let backend = Arc::new(IronDbBackend::new());
//!     let origin = Arc::new(HttpOrigin::new(HttpOriginConfig::default(), backend.clone())?);
//!     let cache = Arc::new(MemoryCache::new(MemoryCacheConfig::default()));
//!     let engine = DeltaProxyCache::new(backend, origin.clone(), cache.clone(), EngineConfig::default());
//!
//!     let config = ApiConfig::default();
//!     let state = AppState::new(Arc::new(engine), origin, cache, config.clone());
//!     serve(state, &config).await?;
//!
//!     Ok(())
//! }
//! ```

pub mod dto;
pub mod error;
pub mod routes;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use state::{ApiConfig, AppState};

use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Build the API router with all routes and middleware
pub fn build_router(state: AppState) -> Router {
    let health_routes = Router::new()
        .route("/live", get(routes::health::liveness))
        .route("/ready", get(routes::health::readiness))
        .route("/", get(routes::health::full_health));

    let shared_state = Arc::new(state);

    Router::new()
        .route("/rollup/*path", get(routes::rollup::rollup))
        .nest("/health", health_routes)
        .fallback(routes::proxy::pass_through)
        .layer(TraceLayer::new_for_http())
        .with_state(shared_state)
}

/// Start the API server
pub async fn serve(state: AppState, config: &ApiConfig) -> Result<(), ApiError> {
    let router = build_router(state);

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Delta proxy listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| ApiError::Internal(format!("Server error: {}", e)))?;

    tracing::info!("Delta proxy shut down gracefully");
    Ok(())
}

/// Wait for shutdown signal
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
