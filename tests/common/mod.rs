use anyhow::Result;
use axum::body::Body;
use axum::http::{Request, Response, StatusCode};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;
use wiremock::MockServer;

use caregate::client::BackendClient;
use caregate::proxy::{app, AppState};

/// Gateway router wired to the given backend.
pub fn gateway(backend_url: &str) -> axum::Router {
    app(AppState::new(BackendClient::new(backend_url)))
}

/// Start a mock backend plus a gateway router pointed at it.
pub async fn gateway_with_backend() -> (axum::Router, MockServer) {
    let backend = MockServer::start().await;
    let router = gateway(&backend.uri());
    (router, backend)
}

/// A backend URL that refuses connections: bind an ephemeral port, then drop
/// the listener.
pub async fn unreachable_backend() -> Result<String> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    drop(listener);
    Ok(format!("http://{}", addr))
}

/// Drive one request through the router and collect the response.
pub async fn send(router: axum::Router, request: Request<Body>) -> Result<TestResponse> {
    let response = router.oneshot(request).await?;
    TestResponse::collect(response).await
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: axum::http::HeaderMap,
    pub body: Vec<u8>,
}

impl TestResponse {
    async fn collect(response: Response<Body>) -> Result<Self> {
        let (parts, body) = response.into_parts();
        let body = body.collect().await?.to_bytes().to_vec();
        Ok(Self {
            status: parts.status,
            headers: parts.headers,
            body,
        })
    }

    pub fn json(&self) -> Result<Value> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    pub fn set_cookies(&self) -> Vec<String> {
        self.headers
            .get_all(axum::http::header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .map(str::to_string)
            .collect()
    }

    /// The Set-Cookie line for `name`, if any.
    pub fn set_cookie(&self, name: &str) -> Option<String> {
        self.set_cookies()
            .into_iter()
            .find(|c| c.starts_with(&format!("{}=", name)))
    }
}
