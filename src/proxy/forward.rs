use axum::{
    body::{Body, Bytes},
    extract::{Path, RawQuery, State},
    http::{header, HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    Extension,
};
use axum_extra::extract::CookieJar;
use serde_json::Value;

use crate::client::{ApiRequest, BackendResponse, RequestContext};
use crate::credentials;
use crate::error::ApiError;
use crate::tenant::TenantContext;

use super::AppState;

/// Relay any `/api/*` call to the backend.
///
/// `RECEIVED -> RESOLVING_TENANT -> BUILDING_REQUEST -> DISPATCHING ->
/// (SUCCESS | BACKEND_ERROR | TRANSPORT_ERROR) -> RESPONDED`; tenant
/// resolution already happened in middleware. Stateless per call, nothing is
/// retried here.
pub async fn relay(
    State(state): State<AppState>,
    Extension(tenant_ctx): Extension<TenantContext>,
    method: Method,
    Path(path): Path<String>,
    RawQuery(query): RawQuery,
    jar: CookieJar,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let ctx = request_context(&tenant_ctx, &jar, &headers);

    let mut request = ApiRequest::new(method.clone(), forward_path(&path, query.as_deref()));
    request = match inbound_payload(&method, &headers, body) {
        Ok(request_with_body) => request_with_body(request),
        Err(err) => return err.into_response(),
    };

    match state.backend.dispatch(request, &ctx).await {
        Ok(response) => relay_response(response),
        Err(err) => ApiError::from(err).into_response(),
    }
}

/// Build the outbound context: tenant from middleware, bearer from the
/// `Authorization` header with the `auth_token` cookie as fallback, and the
/// inbound host/protocol echoed for observability.
pub(super) fn request_context(
    tenant_ctx: &TenantContext,
    jar: &CookieJar,
    headers: &HeaderMap,
) -> RequestContext {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_string)
        .or_else(|| credentials::auth_token(jar));

    let client_host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let client_protocol = headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("http")
        .to_string();

    RequestContext {
        tenant: tenant_ctx.tenant.clone(),
        bearer,
        client_host,
        client_protocol: Some(client_protocol),
    }
}

fn forward_path(path: &str, query: Option<&str>) -> String {
    match query {
        Some(q) if !q.is_empty() => format!("/{}?{}", path, q),
        _ => format!("/{}", path),
    }
}

type WithBody = Box<dyn FnOnce(ApiRequest) -> ApiRequest>;

/// GET/DELETE carry no body; JSON is parsed so garbage fails fast at the
/// gateway; everything else (multipart uploads included) is re-forwarded
/// byte-for-byte with its declared content type.
fn inbound_payload(
    method: &Method,
    headers: &HeaderMap,
    body: Bytes,
) -> Result<WithBody, ApiError> {
    if matches!(*method, Method::GET | Method::DELETE) || body.is_empty() {
        return Ok(Box::new(|r| r));
    }

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/json")
        .to_string();

    if content_type.starts_with("application/json") {
        let json: Value = serde_json::from_slice(&body)
            .map_err(|e| ApiError::invalid_json(format!("Invalid JSON body: {}", e)))?;
        return Ok(Box::new(move |r| r.json(json)));
    }

    Ok(Box::new(move |r| r.raw(content_type, body)))
}

/// Pass the backend's reply through unchanged: status code and body
/// verbatim, success or not.
fn relay_response(response: BackendResponse) -> Response {
    let mut builder = Response::builder().status(response.status);
    if let Some(content_type) = response.content_type {
        builder = builder.header(header::CONTENT_TYPE, content_type);
    }
    builder
        .body(Body::from(response.body))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}
