//! Session credential storage.
//!
//! The gateway owns the dashboard session as a set of cookies with
//! independent lifetimes; authenticated library clients hold the same fields
//! behind the [`CredentialStore`] seam instead.

use async_trait::async_trait;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;

pub const AUTH_COOKIE: &str = "auth_token";
pub const REFRESH_COOKIE: &str = "refresh_token";
pub const USER_COOKIE: &str = "user";
pub const MFA_COOKIE: &str = "mfa_token";
pub const OTP_VERIFIED_COOKIE: &str = "otp_verified";

const AUTH_TTL: time::Duration = time::Duration::days(7);
const REFRESH_TTL: time::Duration = time::Duration::days(30);
const USER_TTL: time::Duration = time::Duration::days(7);
const MFA_TTL: time::Duration = time::Duration::hours(1);
const OTP_VERIFIED_TTL: time::Duration = time::Duration::days(365);

/// Token pair minted by the backend at login or refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionTokens {
    pub auth_token: String,
    pub refresh_token: String,
}

/// Full credential set as held by an authenticated client.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub auth_token: Option<String>,
    pub refresh_token: Option<String>,
    pub user: Option<Value>,
}

fn session_cookie(name: &'static str, value: String, ttl: time::Duration) -> Cookie<'static> {
    Cookie::build((name, value))
        .path("/")
        .same_site(SameSite::Lax)
        .max_age(ttl)
        .build()
}

fn removal_cookie(name: &'static str) -> Cookie<'static> {
    Cookie::build((name, ""))
        .path("/")
        .same_site(SameSite::Lax)
        .max_age(time::Duration::ZERO)
        .build()
}

/// Set the full session in one pass so a partial write can never leave an
/// inconsistent cookie set. Any pre-OTP `mfa_token` is dropped at the same
/// time.
pub fn set_session(jar: CookieJar, tokens: &SessionTokens, user: Option<&Value>) -> CookieJar {
    let mut jar = jar
        .add(session_cookie(AUTH_COOKIE, tokens.auth_token.clone(), AUTH_TTL))
        .add(session_cookie(
            REFRESH_COOKIE,
            tokens.refresh_token.clone(),
            REFRESH_TTL,
        ))
        .add(removal_cookie(MFA_COOKIE));
    if let Some(user) = user {
        jar = jar.add(session_cookie(USER_COOKIE, user.to_string(), USER_TTL));
    }
    jar
}

/// Short-lived credential held between password login and OTP verification.
pub fn set_mfa(jar: CookieJar, token: String) -> CookieJar {
    jar.add(session_cookie(MFA_COOKIE, token, MFA_TTL))
}

/// Marks the browser as having passed an OTP challenge; long TTL so repeat
/// challenges are skipped.
pub fn set_otp_verified(jar: CookieJar) -> CookieJar {
    jar.add(session_cookie(
        OTP_VERIFIED_COOKIE,
        "true".to_string(),
        OTP_VERIFIED_TTL,
    ))
}

/// Remove every credential cookie together.
pub fn clear_session(jar: CookieJar) -> CookieJar {
    jar.add(removal_cookie(AUTH_COOKIE))
        .add(removal_cookie(REFRESH_COOKIE))
        .add(removal_cookie(USER_COOKIE))
        .add(removal_cookie(MFA_COOKIE))
}

fn non_empty(jar: &CookieJar, name: &str) -> Option<String> {
    jar.get(name)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
}

pub fn auth_token(jar: &CookieJar) -> Option<String> {
    non_empty(jar, AUTH_COOKIE)
}

pub fn refresh_token(jar: &CookieJar) -> Option<String> {
    non_empty(jar, REFRESH_COOKIE)
}

pub fn mfa_token(jar: &CookieJar) -> Option<String> {
    non_empty(jar, MFA_COOKIE)
}

/// Storage seam for authenticated clients. Backed by cookies in the gateway
/// and by [`MemoryCredentialStore`] in library clients and tests.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn token(&self) -> Option<String>;
    async fn refresh_token(&self) -> Option<String>;
    async fn user(&self) -> Option<Value>;
    /// Replace all related fields in one step.
    async fn set_credentials(&self, tokens: SessionTokens, user: Option<Value>);
    /// Drop every credential field together.
    async fn clear(&self);
}

/// In-memory credential store; the whole set lives under one lock so writes
/// are atomic.
#[derive(Default)]
pub struct MemoryCredentialStore {
    inner: Mutex<Credentials>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tokens(tokens: SessionTokens) -> Self {
        Self {
            inner: Mutex::new(Credentials {
                auth_token: Some(tokens.auth_token),
                refresh_token: Some(tokens.refresh_token),
                user: None,
            }),
        }
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn token(&self) -> Option<String> {
        self.inner.lock().await.auth_token.clone()
    }

    async fn refresh_token(&self) -> Option<String> {
        self.inner.lock().await.refresh_token.clone()
    }

    async fn user(&self) -> Option<Value> {
        self.inner.lock().await.user.clone()
    }

    async fn set_credentials(&self, tokens: SessionTokens, user: Option<Value>) {
        let mut inner = self.inner.lock().await;
        inner.auth_token = Some(tokens.auth_token);
        inner.refresh_token = Some(tokens.refresh_token);
        if user.is_some() {
            inner.user = user;
        }
    }

    async fn clear(&self) {
        *self.inner.lock().await = Credentials::default();
    }
}
