//! Single-flight token refresh.
//!
//! One coordinator is constructed per client session and owns all refresh
//! state; nothing here is a module-level global. Only the coordinator
//! transitions the in-flight flag, and it does so on every exit path,
//! including task cancellation, so a wedged refresh can never strand the
//! queue.

use std::sync::Mutex;

use serde_json::{json, Value};
use tokio::sync::oneshot;

use crate::client::{ApiRequest, BackendClient, RequestContext, TransportError};
use crate::config;
use crate::credentials::{CredentialStore, SessionTokens};
use crate::session::normalize::normalize_refresh_response;

#[derive(Debug, Clone, thiserror::Error)]
pub enum RefreshError {
    #[error("no refresh token available")]
    NoRefreshToken,
    #[error("refresh rejected by backend ({status})")]
    Rejected { status: u16, body: Value },
    #[error("malformed refresh response: {0}")]
    MalformedResponse(String),
    #[error("backend unreachable during refresh: {0}")]
    Transport(String),
    #[error("refresh aborted before completion")]
    Interrupted,
}

impl From<TransportError> for RefreshError {
    fn from(err: TransportError) -> Self {
        RefreshError::Transport(err.to_string())
    }
}

type Waiter = oneshot::Sender<Result<String, RefreshError>>;

enum RefreshState {
    Idle,
    Refreshing { waiters: Vec<Waiter> },
}

/// Coordinates session refresh for one client: at most one backend refresh
/// call is in flight at a time, and every expiry signal that arrives during
/// the window settles with that call's outcome, FIFO.
pub struct RefreshCoordinator<S: CredentialStore + ?Sized> {
    backend: BackendClient,
    refresh_path: String,
    store: std::sync::Arc<S>,
    state: Mutex<RefreshState>,
}

impl<S: CredentialStore + ?Sized> RefreshCoordinator<S> {
    pub fn new(backend: BackendClient, store: std::sync::Arc<S>) -> Self {
        Self {
            backend,
            refresh_path: config::config().backend.refresh_path.clone(),
            store,
            state: Mutex::new(RefreshState::Idle),
        }
    }

    pub fn with_refresh_path(mut self, path: impl Into<String>) -> Self {
        self.refresh_path = path.into();
        self
    }

    /// Obtain a fresh auth token. The first caller in a failure burst leads
    /// the refresh; everyone else queues and settles with the same outcome.
    pub async fn refresh(&self, ctx: &RequestContext) -> Result<String, RefreshError> {
        let rx = {
            let mut state = self.state.lock().expect("refresh state poisoned");
            match &mut *state {
                RefreshState::Refreshing { waiters } => {
                    let (tx, rx) = oneshot::channel();
                    waiters.push(tx);
                    Some(rx)
                }
                RefreshState::Idle => {
                    *state = RefreshState::Refreshing {
                        waiters: Vec::new(),
                    };
                    None
                }
            }
        };

        if let Some(rx) = rx {
            // Queued behind the in-flight refresh
            return rx.await.unwrap_or(Err(RefreshError::Interrupted));
        }

        // Leader path. The guard resets the flag and drains the queue even
        // if this future is dropped mid-refresh.
        let mut guard = SettleGuard {
            coordinator: self,
            armed: true,
        };
        let outcome = self.perform_refresh(ctx).await;
        guard.settle(&outcome);
        outcome
    }

    async fn perform_refresh(&self, ctx: &RequestContext) -> Result<String, RefreshError> {
        let outcome = self.call_refresh_endpoint(ctx).await;
        if let Err(err) = &outcome {
            // A dead session stays dead: the caller gets the error and the
            // UI layer decides whether to send the user back to login.
            tracing::warn!("Session refresh failed: {}", err);
            self.store.clear().await;
        }
        outcome
    }

    async fn call_refresh_endpoint(&self, ctx: &RequestContext) -> Result<String, RefreshError> {
        let refresh_token = self
            .store
            .refresh_token()
            .await
            .ok_or(RefreshError::NoRefreshToken)?;

        let request = ApiRequest::post(&self.refresh_path)
            .json(json!({ "refresh_token": refresh_token }));

        // The refresh call itself carries no bearer; the refresh token in
        // the body is the credential.
        let mut refresh_ctx = ctx.clone();
        refresh_ctx.bearer = None;

        let response = self.backend.dispatch(request, &refresh_ctx).await?;

        if !response.is_success() {
            return Err(RefreshError::Rejected {
                status: response.status.as_u16(),
                body: response.json().unwrap_or(Value::Null),
            });
        }

        let body = response
            .json()
            .ok_or_else(|| RefreshError::MalformedResponse("response is not JSON".to_string()))?;
        let success =
            normalize_refresh_response(&body).map_err(RefreshError::MalformedResponse)?;

        // A missing rotated refresh token keeps the old one
        let tokens = SessionTokens {
            auth_token: success.token.clone(),
            refresh_token: success.refresh_token.unwrap_or(refresh_token),
        };
        self.store.set_credentials(tokens, success.user).await;

        tracing::debug!("Session refreshed");
        Ok(success.token)
    }

    fn drain_waiters(&self) -> Vec<Waiter> {
        let mut state = self.state.lock().expect("refresh state poisoned");
        match std::mem::replace(&mut *state, RefreshState::Idle) {
            RefreshState::Refreshing { waiters } => waiters,
            RefreshState::Idle => Vec::new(),
        }
    }
}

/// Guaranteed-cleanup path for the leader: on normal completion the queue is
/// settled with the real outcome; if the leader is dropped mid-flight the
/// queue is rejected instead of deadlocking behind a stuck flag.
struct SettleGuard<'a, S: CredentialStore + ?Sized> {
    coordinator: &'a RefreshCoordinator<S>,
    armed: bool,
}

impl<S: CredentialStore + ?Sized> SettleGuard<'_, S> {
    fn settle(&mut self, outcome: &Result<String, RefreshError>) {
        self.armed = false;
        for waiter in self.coordinator.drain_waiters() {
            let _ = waiter.send(outcome.clone());
        }
    }
}

impl<S: CredentialStore + ?Sized> Drop for SettleGuard<'_, S> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        for waiter in self.coordinator.drain_waiters() {
            let _ = waiter.send(Err(RefreshError::Interrupted));
        }
    }
}
