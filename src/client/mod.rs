//! Outbound HTTP to the backend REST service.

use axum::body::Bytes;
use axum::http::StatusCode;
use serde_json::Value;
use tokio::time::Duration;

use crate::config;

mod request;

pub use request::{
    ApiRequest, FilePart, Payload, RequestContext, X_CLIENT_HOST, X_CLIENT_INFO,
    X_CLIENT_PROTOCOL, X_TENANT_ID,
};

/// The backend never answered: connect/DNS/timeout/body-read failure. An
/// HTTP error status is NOT a transport error; those relay verbatim.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("backend request failed: {0}")]
    Request(#[from] reqwest::Error),
}

/// Backend reply, whatever its status.
#[derive(Debug, Clone)]
pub struct BackendResponse {
    pub status: StatusCode,
    pub content_type: Option<String>,
    pub body: Bytes,
}

impl BackendResponse {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn json(&self) -> Option<Value> {
        serde_json::from_slice(&self.body).ok()
    }
}

/// HTTP client bound to the configured backend base URL, with the pooling
/// and timeout knobs from config.
#[derive(Debug, Clone)]
pub struct BackendClient {
    http: reqwest::Client,
    base_url: String,
}

impl BackendClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let http_cfg = &config::config().http;
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(http_cfg.connect_timeout_secs))
            .timeout(Duration::from_secs(http_cfg.request_timeout_secs))
            .pool_max_idle_per_host(http_cfg.pool_max_idle_per_host)
            .pool_idle_timeout(Duration::from_secs(http_cfg.pool_idle_timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            http,
            base_url: base_url.into(),
        }
    }

    pub fn from_config() -> Self {
        Self::new(config::config().backend.base_url.clone())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Send the request and return whatever the backend said. Every HTTP
    /// status comes back as `Ok`; `Err` means no response arrived at all.
    pub async fn dispatch(
        &self,
        request: ApiRequest,
        ctx: &RequestContext,
    ) -> Result<BackendResponse, TransportError> {
        let method = request.method.clone();
        let path = request.path.clone();

        let response = request
            .into_reqwest(&self.http, &self.base_url, ctx)
            .send()
            .await?;

        let status = response.status();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.bytes().await?;

        tracing::debug!("{} {} -> {}", method, path, status);

        Ok(BackendResponse {
            status,
            content_type,
            body,
        })
    }
}
