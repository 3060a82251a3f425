//! Backend auth-response interpretation.
//!
//! The backend has shipped several response shapes over time; everything the
//! rest of the crate needs is normalized here, in one place, with a fixed
//! priority order.

use axum::http::StatusCode;
use serde_json::Value;

/// Wording that means credentials were *absent*, not expired. A logged-out
/// user must never trigger a refresh attempt.
const ABSENT_MARKERS: &[&str] = &["no token", "token not provided", "not logged in"];

/// Wording that marks a 403 as an expiry rather than a plain authorization
/// failure.
const EXPIRED_MARKERS: &[&str] = &["expired", "invalid token", "jwt"];

/// Whether a backend reply signals that the session token has expired.
///
/// 401 always counts. 403 counts only when the error message names an
/// expired/invalid token; "no token" style messages mean the caller never
/// had credentials and refreshing would loop forever.
pub fn is_auth_expired(status: StatusCode, body: &Value) -> bool {
    if status == StatusCode::UNAUTHORIZED {
        return true;
    }
    if status != StatusCode::FORBIDDEN {
        return false;
    }

    let message = error_message(body).to_lowercase();
    if ABSENT_MARKERS.iter().any(|m| message.contains(m)) {
        return false;
    }
    EXPIRED_MARKERS.iter().any(|m| message.contains(m))
}

fn error_message(body: &Value) -> String {
    for key in ["message", "error", "detail"] {
        if let Some(text) = body.get(key).and_then(Value::as_str) {
            return text.to_string();
        }
    }
    String::new()
}

/// Normalized outcome of a successful refresh call.
#[derive(Debug, Clone, PartialEq)]
pub struct RefreshSuccess {
    pub token: String,
    pub refresh_token: Option<String>,
    pub user: Option<Value>,
}

/// Extract the new tokens from a refresh response, whatever envelope and key
/// aliases this backend version used.
///
/// Envelopes are searched deepest-`data` first; within an envelope the token
/// aliases are tried in the order `token`, `accessToken`, `access_token`
/// (and `refreshToken` before `refresh_token`).
pub fn normalize_refresh_response(body: &Value) -> Result<RefreshSuccess, String> {
    let envelopes = data_envelopes(body);

    let token = first_string(&envelopes, &["token", "accessToken", "access_token"])
        .ok_or_else(|| "no token field in refresh response".to_string())?;
    let refresh_token = first_string(&envelopes, &["refreshToken", "refresh_token"]);
    let user = envelopes
        .iter()
        .find_map(|env| env.get("user").filter(|u| u.is_object()).cloned());

    Ok(RefreshSuccess {
        token,
        refresh_token,
        user,
    })
}

/// What a successful login reply means for the session.
#[derive(Debug, Clone, PartialEq)]
pub enum LoginOutcome {
    /// Full session issued immediately.
    Session(RefreshSuccess),
    /// Password accepted but an OTP challenge stands between the user and a
    /// session; only the short-lived MFA credential was issued.
    OtpChallenge { mfa_token: String },
}

/// Interpret a login response: an MFA challenge when the backend issued only
/// an `mfa_token`, otherwise the usual token shape.
pub fn normalize_login_response(body: &Value) -> Result<LoginOutcome, String> {
    let envelopes = data_envelopes(body);
    if let Some(mfa_token) = first_string(&envelopes, &["mfa_token", "mfaToken"]) {
        return Ok(LoginOutcome::OtpChallenge { mfa_token });
    }
    normalize_refresh_response(body).map(LoginOutcome::Session)
}

/// `body`, `body.data`, `body.data.data`, ... deepest first.
fn data_envelopes(body: &Value) -> Vec<&Value> {
    let mut envelopes = vec![body];
    let mut current = body;
    while let Some(inner) = current.get("data").filter(|v| v.is_object()) {
        envelopes.push(inner);
        current = inner;
    }
    envelopes.reverse();
    envelopes
}

fn first_string(envelopes: &[&Value], aliases: &[&str]) -> Option<String> {
    for env in envelopes {
        for alias in aliases {
            if let Some(value) = env.get(*alias).and_then(Value::as_str) {
                if !value.is_empty() {
                    return Some(value.to_string());
                }
            }
        }
    }
    None
}
