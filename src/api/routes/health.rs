//! Health Routes
//!
//! Health check endpoints for monitoring and Kubernetes probes.
//!
//! - GET /health/live - Liveness probe (process is alive)
//! - GET /health/ready - Readiness probe (cache store reachable)
//! - GET /health - Full health status

use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;

use crate::api::dto::HealthResponse;
use crate::api::state::AppState;

/// GET /health/live
///
/// Returns 200 if the process is alive, no dependency checks.
pub async fn liveness() -> StatusCode {
    StatusCode::OK
}

/// GET /health/ready
///
/// Returns 200 when the cache store answers.
pub async fn readiness(State(state): State<Arc<AppState>>) -> StatusCode {
    match check_cache_health(&state).await {
        true => StatusCode::OK,
        false => StatusCode::SERVICE_UNAVAILABLE,
    }
}

/// GET /health
///
/// Full health status with cache counters.
pub async fn full_health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let cache_ok = check_cache_health(&state).await;
    let stats = state.cache.stats();

    Json(HealthResponse {
        status: if cache_ok { "healthy" } else { "degraded" }.to_string(),
        cache: if cache_ok { "ok" } else { "error" }.to_string(),
        backend: state.engine.backend().name().to_string(),
        cache_entries: stats.entries,
        cache_hits: stats.hits,
        cache_misses: stats.misses,
        uptime_seconds: state.uptime_seconds(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn check_cache_health(state: &AppState) -> bool {
    match state.cache.ping().await {
        Ok(_) => true,
        Err(e) => {
            tracing::warn!(error = %e, "Cache health check failed");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_liveness() {
        let status = liveness().await;
        assert_eq!(status, StatusCode::OK);
    }
}
