use axum::body::Bytes;
use axum::http::Method;
use reqwest::multipart;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::config;
use crate::tenant::TenantId;

pub const X_TENANT_ID: &str = "x-tenant-id";
pub const X_CLIENT_INFO: &str = "x-client-info";
pub const X_CLIENT_HOST: &str = "x-client-host";
pub const X_CLIENT_PROTOCOL: &str = "x-client-protocol";

/// Context attached to every outbound call: who the request is for and where
/// it came from.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub tenant: Option<TenantId>,
    pub bearer: Option<String>,
    /// Inbound host, echoed for observability only.
    pub client_host: Option<String>,
    /// Inbound scheme, echoed for observability only.
    pub client_protocol: Option<String>,
}

/// A file attached to a form upload.
#[derive(Debug, Clone)]
pub struct FilePart {
    pub file_name: String,
    pub mime: String,
    pub bytes: Bytes,
}

/// Request body variants the builder knows how to encode.
#[derive(Debug, Clone)]
pub enum Payload {
    Empty,
    Json(Value),
    /// JSON data re-encoded as multipart form fields alongside file parts.
    Form { data: Value, files: Vec<FilePart> },
    /// Inbound bytes re-forwarded with their declared content type.
    Raw { content_type: String, bytes: Bytes },
}

/// A fully-described backend call. Building one never fails; only dispatch
/// can.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub payload: Payload,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            payload: Payload::Empty,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.payload = Payload::Json(body);
        self
    }

    /// Attach files; the JSON body is re-encoded as multipart form fields.
    pub fn form(mut self, data: Value, files: Vec<FilePart>) -> Self {
        self.payload = Payload::Form { data, files };
        self
    }

    pub fn raw(mut self, content_type: impl Into<String>, bytes: Bytes) -> Self {
        self.payload = Payload::Raw {
            content_type: content_type.into(),
            bytes,
        };
        self
    }

    /// Assemble the reqwest call: URL join, query string, context headers,
    /// and body encoding.
    pub fn into_reqwest(
        self,
        http: &reqwest::Client,
        base_url: &str,
        ctx: &RequestContext,
    ) -> reqwest::RequestBuilder {
        let url = join_url(base_url, &self.path);
        let mut rb = http.request(self.method, url);

        if !self.query.is_empty() {
            rb = rb.query(&self.query);
        }

        rb = rb.header(X_CLIENT_INFO, client_info().to_string());
        if let Some(host) = &ctx.client_host {
            rb = rb.header(X_CLIENT_HOST, host.as_str());
        }
        if let Some(proto) = &ctx.client_protocol {
            rb = rb.header(X_CLIENT_PROTOCOL, proto.as_str());
        }
        if let Some(tenant) = &ctx.tenant {
            rb = rb.header(X_TENANT_ID, tenant.as_str());
        }
        if let Some(token) = usable_token(ctx.bearer.as_deref()) {
            rb = rb.bearer_auth(token);
        }

        match self.payload {
            Payload::Empty => rb,
            Payload::Json(body) => rb.json(&body),
            Payload::Form { data, files } => rb.multipart(build_form(data, files)),
            Payload::Raw {
                content_type,
                bytes,
            } => rb
                .header(reqwest::header::CONTENT_TYPE, content_type)
                .body(bytes),
        }
    }
}

/// Tokens at or below the configured minimum length are junk (empty strings,
/// literal "null"s from a stale cookie) and are never attached.
fn usable_token(token: Option<&str>) -> Option<&str> {
    token.filter(|t| t.len() > config::config().session.min_token_len)
}

/// Diagnostic bundle sent on every call. Observability only; the backend must
/// not route on it.
fn client_info() -> Value {
    json!({
        "name": config::config().session.client_name,
        "version": env!("CARGO_PKG_VERSION"),
        "request_id": Uuid::new_v4(),
    })
}

fn join_url(base_url: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Each top-level data key becomes its own form field; file arrays repeat
/// under `file[]`, a single file goes under `file`.
fn build_form(data: Value, files: Vec<FilePart>) -> multipart::Form {
    let mut form = multipart::Form::new();

    if let Value::Object(map) = data {
        for (key, value) in map {
            let text = match value {
                Value::String(s) => s,
                other => other.to_string(),
            };
            form = form.text(key, text);
        }
    }

    let field_name = if files.len() > 1 { "file[]" } else { "file" };
    for file in files {
        let part = multipart::Part::bytes(file.bytes.to_vec()).file_name(file.file_name.clone());
        // An unparseable mime falls back to the default part type; building
        // a request never fails
        let part = match part.mime_str(&file.mime) {
            Ok(p) => p,
            Err(_) => multipart::Part::bytes(file.bytes.to_vec()).file_name(file.file_name),
        };
        form = form.part(field_name, part);
    }

    form
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_tokens_are_not_usable() {
        assert_eq!(usable_token(None), None);
        assert_eq!(usable_token(Some("")), None);
        assert_eq!(usable_token(Some("null")), None);
        assert_eq!(usable_token(Some("short")), None);
        assert_eq!(
            usable_token(Some("long-enough-token")),
            Some("long-enough-token")
        );
    }

    #[test]
    fn join_url_normalizes_slashes() {
        assert_eq!(
            join_url("http://backend:8000/", "/tenant/department"),
            "http://backend:8000/tenant/department"
        );
        assert_eq!(
            join_url("http://backend:8000", "tenant/department"),
            "http://backend:8000/tenant/department"
        );
    }

    #[test]
    fn client_info_is_valid_json_with_identity() {
        let info = client_info();
        assert_eq!(info["name"], "caregate");
        assert!(info["version"].as_str().is_some());
        assert!(info["request_id"].as_str().is_some());
    }

    #[tokio::test]
    async fn request_builder_sets_context_headers() {
        let http = reqwest::Client::new();
        let ctx = RequestContext {
            tenant: Some(TenantId::new("acme")),
            bearer: Some("token-1234567890abc".into()),
            client_host: Some("acme.joee.com.ng".into()),
            client_protocol: Some("https".into()),
        };
        let req = ApiRequest::get("/tenant/department")
            .query("page", "2")
            .into_reqwest(&http, "http://backend:8000", &ctx)
            .build()
            .unwrap();

        assert_eq!(req.url().as_str(), "http://backend:8000/tenant/department?page=2");
        let headers = req.headers();
        assert_eq!(headers.get(X_TENANT_ID).unwrap(), "acme");
        assert_eq!(headers.get(X_CLIENT_HOST).unwrap(), "acme.joee.com.ng");
        assert_eq!(headers.get(X_CLIENT_PROTOCOL).unwrap(), "https");
        assert_eq!(
            headers.get(reqwest::header::AUTHORIZATION).unwrap(),
            "Bearer token-1234567890abc"
        );
        let info: Value =
            serde_json::from_str(headers.get(X_CLIENT_INFO).unwrap().to_str().unwrap()).unwrap();
        assert!(info["request_id"].as_str().is_some());
    }

    #[tokio::test]
    async fn garbage_token_and_missing_tenant_omit_headers() {
        let http = reqwest::Client::new();
        let ctx = RequestContext {
            tenant: None,
            bearer: Some("short".into()),
            ..Default::default()
        };
        let req = ApiRequest::get("/tenant/patients")
            .into_reqwest(&http, "http://backend:8000", &ctx)
            .build()
            .unwrap();

        assert!(req.headers().get(X_TENANT_ID).is_none());
        assert!(req.headers().get(reqwest::header::AUTHORIZATION).is_none());
    }

    #[tokio::test]
    async fn file_upload_switches_to_multipart_and_keeps_fields() {
        let http = reqwest::Client::new();
        let files = vec![FilePart {
            file_name: "scan.pdf".into(),
            mime: "application/pdf".into(),
            bytes: Bytes::from_static(b"%PDF-"),
        }];
        let req = ApiRequest::post("/tenant/patients")
            .form(json!({"name": "Ada Obi", "age": 34}), files)
            .into_reqwest(&http, "http://backend:8000", &RequestContext::default())
            .build()
            .unwrap();

        let content_type = req
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .unwrap()
            .to_str()
            .unwrap();
        assert!(content_type.starts_with("multipart/form-data"));
    }
}
