//! HTTP Origin Client
//!
//! reqwest client for the upstream time-series backend.

use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;

use super::{Backend, OriginError, OriginFetcher, RawResponse, UpstreamRequest};
use crate::timeseries::{Extent, Series, TimeRangeQuery};

/// Configuration for the HTTP origin
#[derive(Debug, Clone)]
pub struct HttpOriginConfig {
    /// Base URL of the backend (e.g., "http://localhost:8112")
    pub base_url: String,
    /// Connect timeout in milliseconds; fetch deadlines are applied by the engine
    pub connect_timeout_ms: u64,
    /// User agent sent upstream
    pub user_agent: String,
}

impl Default for HttpOriginConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8112".to_string(),
            connect_timeout_ms: 2000,
            user_agent: format!("deltaproxy/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Origin reached over HTTP
pub struct HttpOrigin {
    client: Client,
    config: HttpOriginConfig,
    backend: Arc<dyn Backend>,
}

impl HttpOrigin {
    pub fn new(config: HttpOriginConfig, backend: Arc<dyn Backend>) -> Result<Self, OriginError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self {
            client,
            config,
            backend,
        })
    }

    pub fn config(&self) -> &HttpOriginConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn send(&self, request: &UpstreamRequest) -> Result<reqwest::Response, OriginError> {
        self.client
            .get(self.url(&request.path))
            .query(&request.params)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    OriginError::Timeout
                } else if e.is_connect() {
                    OriginError::Unavailable
                } else {
                    OriginError::Request(e)
                }
            })
    }
}

#[async_trait]
impl OriginFetcher for HttpOrigin {
    async fn fetch(
        &self,
        request: &UpstreamRequest,
        query: &TimeRangeQuery,
        extent: &Extent,
    ) -> Result<Series, OriginError> {
        tracing::debug!(
            path = %request.path,
            extent = %extent,
            step = query.step,
            "Fetching from origin"
        );

        let response = self.send(request).await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(OriginError::Status {
                status: status.as_u16(),
                message: text,
            });
        }

        let body = response.bytes().await?;
        self.backend.decode(&body)
    }

    async fn forward(&self, request: &UpstreamRequest) -> Result<RawResponse, OriginError> {
        let response = self.send(request).await?;
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.bytes().await?.to_vec();

        Ok(RawResponse {
            status,
            content_type,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::origin::IronDbBackend;

    #[test]
    fn test_default_config() {
        let config = HttpOriginConfig::default();
        assert_eq!(config.base_url, "http://localhost:8112");
        assert!(config.user_agent.starts_with("deltaproxy/"));
    }

    #[test]
    fn test_url_joins_path() {
        let origin = HttpOrigin::new(
            HttpOriginConfig {
                base_url: "http://origin:8112/".to_string(),
                ..Default::default()
            },
            Arc::new(IronDbBackend::new()),
        )
        .unwrap();

        assert_eq!(origin.url("/rollup/abc"), "http://origin:8112/rollup/abc");
    }

    #[tokio::test]
    async fn test_unreachable_origin_is_unavailable() {
        let origin = HttpOrigin::new(
            HttpOriginConfig {
                base_url: "http://127.0.0.1:1".to_string(),
                ..Default::default()
            },
            Arc::new(IronDbBackend::new()),
        )
        .unwrap();

        let query = TimeRangeQuery::try_new("/rollup/abc", Extent::new(0, 60_000), 60_000).unwrap();
        let result = origin
            .fetch(&UpstreamRequest::new("/rollup/abc"), &query, &query.extent)
            .await;

        assert!(matches!(result, Err(OriginError::Unavailable)));
    }
}
