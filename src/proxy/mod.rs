//! The gateway HTTP surface: auth cookie routes plus the catch-all relay.

use axum::{
    middleware,
    routing::{any, get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::client::BackendClient;
use crate::tenant::tenant_middleware;

mod auth;
mod forward;

#[derive(Clone)]
pub struct AppState {
    pub backend: BackendClient,
}

impl AppState {
    pub fn new(backend: BackendClient) -> Self {
        Self { backend }
    }
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        // Session management
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/verify-otp", post(auth::verify_otp))
        .route("/api/auth/logout", post(auth::logout))
        // Everything else relays to the backend
        .route("/api/*path", any(forward::relay))
        // Global middleware
        .layer(middleware::from_fn(tenant_middleware))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "caregate",
        "version": env!("CARGO_PKG_VERSION"),
        "time": chrono::Utc::now().to_rfc3339(),
    }))
}
