//! Pass-through Route
//!
//! Anything that is not a rollup or health request is forwarded to the
//! origin unchanged and never cached.

use axum::{
    extract::{Query, State},
    http::{header::CONTENT_TYPE, HeaderValue, StatusCode, Uri},
    response::{IntoResponse, Response},
};
use std::sync::Arc;

use crate::api::error::ApiResult;
use crate::api::state::AppState;
use crate::origin::UpstreamRequest;

/// Fallback handler
pub async fn pass_through(
    State(state): State<Arc<AppState>>,
    uri: Uri,
    Query(params): Query<Vec<(String, String)>>,
) -> ApiResult<Response> {
    let request = UpstreamRequest {
        path: uri.path().to_string(),
        params,
    };
    tracing::debug!(path = %request.path, "Proxying request");

    let raw = state.origin.forward(&request).await?;

    let status = StatusCode::from_u16(raw.status).unwrap_or(StatusCode::BAD_GATEWAY);
    let mut response = (status, raw.body).into_response();
    if let Some(value) = raw
        .content_type
        .and_then(|ct| HeaderValue::from_str(&ct).ok())
    {
        response.headers_mut().insert(CONTENT_TYPE, value);
    }

    Ok(response)
}
