//! API Error Types
//!
//! Converts engine and origin errors into HTTP responses with appropriate
//! status codes.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::engine::ProxyError;
use crate::origin::OriginError;

/// API error types
#[derive(Error, Debug)]
pub enum ApiError {
    /// Delta proxy cache failure
    #[error(transparent)]
    Proxy(#[from] ProxyError),

    /// Pass-through origin failure
    #[error("Origin error: {0}")]
    Origin(#[from] OriginError),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Error response body
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
    pub request_id: String,
}

/// Error details
#[derive(Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

impl ApiError {
    /// Status code and machine-readable error code
    pub fn status(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::Proxy(e) => match e {
                ProxyError::MissingParameter(_) => (StatusCode::BAD_REQUEST, "MISSING_PARAMETER"),
                ProxyError::InvalidParameter { .. } => {
                    (StatusCode::BAD_REQUEST, "INVALID_PARAMETER")
                }
                ProxyError::InvalidRange => (StatusCode::BAD_REQUEST, "INVALID_RANGE"),
                ProxyError::UpstreamFetchFailed { .. } | ProxyError::UpstreamUnavailable => {
                    (StatusCode::BAD_GATEWAY, "UPSTREAM_UNAVAILABLE")
                }
                ProxyError::CacheStoreUnavailable(_) => {
                    (StatusCode::SERVICE_UNAVAILABLE, "CACHE_UNAVAILABLE")
                }
                ProxyError::DeadlineExceeded => (StatusCode::GATEWAY_TIMEOUT, "DEADLINE_EXCEEDED"),
                ProxyError::Encode(_) => (StatusCode::INTERNAL_SERVER_ERROR, "ENCODE_ERROR"),
            },
            ApiError::Origin(e) => match e {
                OriginError::Timeout => (StatusCode::GATEWAY_TIMEOUT, "ORIGIN_TIMEOUT"),
                OriginError::Unsupported(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
                _ => (StatusCode::BAD_GATEWAY, "ORIGIN_ERROR"),
            },
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
            ApiError::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "IO_ERROR"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status();
        let request_id = uuid::Uuid::new_v4().to_string();

        tracing::error!(
            request_id = %request_id,
            error_code = %code,
            error_message = %self,
            "API error occurred"
        );

        let body = ErrorResponse {
            error: ErrorBody {
                code: code.to_string(),
                message: self.to_string(),
            },
            request_id,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type for API operations
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let err = ApiError::from(ProxyError::MissingParameter("start_ts".to_string()));
        assert_eq!(err.status(), (StatusCode::BAD_REQUEST, "MISSING_PARAMETER"));

        let err = ApiError::from(ProxyError::UpstreamUnavailable);
        assert_eq!(err.status().0, StatusCode::BAD_GATEWAY);

        let err = ApiError::from(ProxyError::DeadlineExceeded);
        assert_eq!(err.status().0, StatusCode::GATEWAY_TIMEOUT);

        let err = ApiError::from(OriginError::Unsupported("/x".to_string()));
        assert_eq!(err.status().0, StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_proxy_message_is_transparent() {
        let err = ApiError::from(ProxyError::MissingParameter("end_ts".to_string()));
        assert_eq!(err.to_string(), "Missing URL parameter: end_ts");
    }
}
