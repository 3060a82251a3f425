//! Authenticated calls with transparent session refresh.

use std::sync::{Arc, Mutex};

use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::client::{ApiRequest, BackendClient, BackendResponse, RequestContext, TransportError};
use crate::credentials::CredentialStore;
use crate::session::coordinator::{RefreshCoordinator, RefreshError};
use crate::session::normalize::is_auth_expired;

#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Refresh(#[from] RefreshError),
    #[error("request cancelled")]
    Cancelled,
}

/// Client wrapper that attaches the stored bearer token to every call and,
/// on an auth-expired reply, refreshes the session once per failure burst
/// before replaying.
pub struct AuthClient {
    backend: BackendClient,
    store: Arc<dyn CredentialStore>,
    coordinator: RefreshCoordinator<dyn CredentialStore>,
    /// Session epoch: cancelling it aborts in-flight GETs (navigation,
    /// unmount) but never an in-flight refresh.
    epoch: Mutex<CancellationToken>,
}

impl AuthClient {
    pub fn new(backend: BackendClient, store: Arc<dyn CredentialStore>) -> Self {
        let coordinator = RefreshCoordinator::new(backend.clone(), store.clone());
        Self {
            backend,
            store,
            coordinator,
            epoch: Mutex::new(CancellationToken::new()),
        }
    }

    pub fn with_refresh_path(mut self, path: impl Into<String>) -> Self {
        self.coordinator = self.coordinator.with_refresh_path(path);
        self
    }

    /// Abort all in-flight GETs and start a new epoch. An in-flight refresh
    /// keeps running; its result is still worth persisting.
    pub fn reset_epoch(&self) {
        let mut epoch = self.epoch.lock().expect("epoch lock poisoned");
        epoch.cancel();
        *epoch = CancellationToken::new();
    }

    fn current_epoch(&self) -> CancellationToken {
        self.epoch.lock().expect("epoch lock poisoned").clone()
    }

    /// Dispatch with bearer attachment and at most one refresh-and-replay
    /// per expiry cycle. A second expiry after a successful replay starts a
    /// fresh cycle; a failed refresh ends the call.
    pub async fn request(
        &self,
        request: ApiRequest,
        ctx: &RequestContext,
    ) -> Result<BackendResponse, RequestError> {
        let cancel = (request.method == axum::http::Method::GET).then(|| self.current_epoch());

        loop {
            let mut attempt_ctx = ctx.clone();
            attempt_ctx.bearer = self.store.token().await;

            let response = match &cancel {
                Some(token) => tokio::select! {
                    _ = token.cancelled() => return Err(RequestError::Cancelled),
                    result = self.backend.dispatch(request.clone(), &attempt_ctx) => result?,
                },
                None => self.backend.dispatch(request.clone(), &attempt_ctx).await?,
            };

            let body = response.json().unwrap_or(Value::Null);
            if !is_auth_expired(response.status, &body) {
                return Ok(response);
            }

            tracing::debug!(
                "{} {} signalled auth expiry; refreshing session",
                request.method,
                request.path
            );
            // Queues behind any in-flight refresh; exactly one backend
            // refresh call per burst
            self.coordinator.refresh(ctx).await?;
        }
    }

    pub fn store(&self) -> &Arc<dyn CredentialStore> {
        &self.store
    }
}
