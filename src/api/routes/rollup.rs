//! Rollup Routes
//!
//! IRONdb rollup requests served through the delta proxy cache.
//!
//! - GET /rollup/*path - Time range query
//!
//! The optional `fast_forward` parameter is consumed here and never sent
//! upstream.

use axum::{
    extract::{Query, State},
    http::{
        header::{CONTENT_TYPE, WARNING},
        HeaderName, HeaderValue, StatusCode, Uri,
    },
    response::{IntoResponse, Response},
};
use std::sync::Arc;

use crate::api::error::{ApiError, ApiResult};
use crate::api::state::AppState;
use crate::engine::{DeltaResponse, ProxyError};
use crate::origin::UpstreamRequest;

/// Result header reporting cache and fast-forward status
pub const RESULT_HEADER: HeaderName = HeaderName::from_static("x-delta-proxy-result");

/// Inbound-only flag toggling the fast-forward sub-request
pub const FAST_FORWARD_PARAM: &str = "fast_forward";

/// GET /rollup/*path
pub async fn rollup(
    State(state): State<Arc<AppState>>,
    uri: Uri,
    Query(params): Query<Vec<(String, String)>>,
) -> ApiResult<Response> {
    let mut request = UpstreamRequest {
        path: uri.path().to_string(),
        params,
    };
    let fast_forward = match request.remove(FAST_FORWARD_PARAM) {
        Some(raw) => parse_flag(&raw).ok_or_else(|| ProxyError::InvalidParameter {
            name: FAST_FORWARD_PARAM.to_string(),
            value: raw.clone(),
        })?,
        None => true,
    };

    let result = tokio::time::timeout(
        state.config.request_timeout(),
        state.engine.handle(&request, fast_forward),
    )
    .await
    .map_err(|_| ProxyError::DeadlineExceeded)??;

    let body = state.engine.encode(&result.series)?;
    respond(&state, &result, body)
}

fn respond(state: &AppState, result: &DeltaResponse, body: Vec<u8>) -> ApiResult<Response> {
    let mut response = (StatusCode::OK, body).into_response();
    let headers = response.headers_mut();

    headers.insert(
        CONTENT_TYPE,
        HeaderValue::from_static(state.engine.backend().content_type()),
    );
    headers.insert(RESULT_HEADER, header_value(&result.result_header())?);
    for warning in &result.warnings {
        let value = format!("{} deltaproxy \"{}\"", warning.code(), warning);
        headers.append(WARNING, header_value(&value)?);
    }

    Ok(response)
}

fn header_value(value: &str) -> ApiResult<HeaderValue> {
    HeaderValue::from_str(value).map_err(|e| ApiError::Internal(format!("Invalid header: {}", e)))
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
