//! Login, OTP verification, and logout.
//!
//! These routes forward to the backend like everything else, but own the
//! session-cookie contract on the way back: a successful login or OTP
//! verification writes the full cookie set atomically, logout removes it.

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use axum_extra::extract::CookieJar;
use serde_json::{json, Value};

use crate::client::ApiRequest;
use crate::config;
use crate::credentials::{self, SessionTokens};
use crate::error::ApiError;
use crate::session::{normalize_login_response, normalize_refresh_response, LoginOutcome};
use crate::tenant::TenantContext;

use super::forward::request_context;
use super::AppState;

/// POST /api/auth/login - forward credentials, then establish the session.
///
/// The backend decides between a full session and an OTP challenge; the
/// gateway just writes the matching cookies. Backend errors relay verbatim.
pub async fn login(
    State(state): State<AppState>,
    Extension(tenant_ctx): Extension<TenantContext>,
    jar: CookieJar,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let ctx = request_context(&tenant_ctx, &jar, &headers);
    let request = ApiRequest::post(&config::config().backend.login_path).json(body);

    let response = match state.backend.dispatch(request, &ctx).await {
        Ok(r) => r,
        Err(e) => return ApiError::from(e).into_response(),
    };

    let payload = response.json().unwrap_or(Value::Null);
    if !response.is_success() {
        return (response.status, Json(payload)).into_response();
    }

    match normalize_login_response(&payload) {
        Ok(LoginOutcome::OtpChallenge { mfa_token }) => {
            let jar = credentials::set_mfa(jar, mfa_token);
            (jar, Json(payload)).into_response()
        }
        Ok(LoginOutcome::Session(session)) => {
            let tokens = SessionTokens {
                auth_token: session.token,
                // No rotated refresh token on a fresh login is a backend bug;
                // store an empty one rather than failing the login
                refresh_token: session.refresh_token.unwrap_or_default(),
            };
            let jar = credentials::set_session(jar, &tokens, session.user.as_ref());
            (jar, Json(payload)).into_response()
        }
        Err(msg) => {
            tracing::error!("Unusable login response from backend: {}", msg);
            ApiError::bad_gateway("Backend returned an unusable login response").into_response()
        }
    }
}

/// POST /api/auth/verify-otp - complete the MFA challenge.
///
/// The pending `mfa_token` cookie is the credential for this call; on
/// success the session is promoted and repeat challenges are suppressed for
/// a year.
pub async fn verify_otp(
    State(state): State<AppState>,
    Extension(tenant_ctx): Extension<TenantContext>,
    jar: CookieJar,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let Some(mfa_token) = credentials::mfa_token(&jar) else {
        return ApiError::unauthorized("No MFA challenge in progress").into_response();
    };

    let mut ctx = request_context(&tenant_ctx, &jar, &headers);
    ctx.bearer = Some(mfa_token);

    let request = ApiRequest::post(&config::config().backend.verify_otp_path).json(body);
    let response = match state.backend.dispatch(request, &ctx).await {
        Ok(r) => r,
        Err(e) => return ApiError::from(e).into_response(),
    };

    let payload = response.json().unwrap_or(Value::Null);
    if !response.is_success() {
        return (response.status, Json(payload)).into_response();
    }

    match normalize_refresh_response(&payload) {
        Ok(session) => {
            let tokens = SessionTokens {
                auth_token: session.token,
                refresh_token: session.refresh_token.unwrap_or_default(),
            };
            let jar = credentials::set_session(jar, &tokens, session.user.as_ref());
            let jar = credentials::set_otp_verified(jar);
            (jar, Json(payload)).into_response()
        }
        Err(msg) => {
            tracing::error!("Unusable OTP response from backend: {}", msg);
            ApiError::bad_gateway("Backend returned an unusable OTP response").into_response()
        }
    }
}

/// POST /api/auth/logout - drop every credential cookie together.
///
/// Purely local: the backend keeps no session state worth revoking, and a
/// dead backend must not keep a browser logged in.
pub async fn logout(jar: CookieJar) -> Response {
    let jar = credentials::clear_session(jar);
    (jar, (StatusCode::OK, Json(json!({ "success": true })))).into_response()
}
