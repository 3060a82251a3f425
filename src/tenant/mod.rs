use axum::{
    extract::Request,
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::config;

/// Tenant identifier for multi-tenant isolation
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TenantId(pub String);

impl TenantId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for TenantId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for TenantId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for TenantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Per-request tenant context, injected by [`tenant_middleware`]
#[derive(Clone, Debug)]
pub struct TenantContext {
    pub tenant: Option<TenantId>,
}

/// Subdomain-extraction rules. Enumerated rather than sniffed so resolution
/// is a pure function testable without any HTTP context.
#[derive(Debug, Clone)]
pub struct TenantRules {
    wildcard_suffixes: Vec<String>,
    reserved_labels: Vec<String>,
}

impl TenantRules {
    pub fn new(wildcard_suffixes: Vec<String>, reserved_labels: Vec<String>) -> Self {
        Self {
            wildcard_suffixes,
            reserved_labels,
        }
    }

    pub fn from_config() -> Self {
        let cfg = &config::config().tenant;
        Self::new(cfg.wildcard_suffixes.clone(), cfg.reserved_labels.clone())
    }

    /// Derive the tenant id from the request's `Host` header, falling back to
    /// the `Referer` hostname when the host yields nothing usable.
    ///
    /// The candidate is passed through verbatim; the backend is the authority
    /// on whether the tenant actually exists.
    pub fn resolve(&self, host: &str, referer: Option<&str>) -> Option<TenantId> {
        if let Some(candidate) = self.candidate_from_host(host) {
            return Some(TenantId(candidate));
        }

        // Malformed referers are treated as absent
        let referer_host = referer
            .and_then(|r| Url::parse(r).ok())
            .and_then(|u| u.host_str().map(str::to_owned))?;

        self.candidate_from_host(&referer_host).map(TenantId)
    }

    fn candidate_from_host(&self, host: &str) -> Option<String> {
        let hostname = strip_port(host).to_ascii_lowercase();

        // PaaS wildcard domains: with a known multi-level suffix and at least
        // one label in front of it, the first label is the tenant.
        for suffix in &self.wildcard_suffixes {
            if let Some(prefix) = hostname
                .strip_suffix(suffix.as_str())
                .and_then(|p| p.strip_suffix('.'))
            {
                let label = prefix.split('.').next().unwrap_or("");
                return self.accept(label);
            }
        }

        let label = hostname.split('.').next().unwrap_or("");
        self.accept(label)
    }

    fn accept(&self, label: &str) -> Option<String> {
        if label.is_empty() || self.reserved_labels.iter().any(|r| r == label) {
            None
        } else {
            Some(label.to_string())
        }
    }
}

/// Pure resolver over the configured rules.
pub fn resolve_tenant(host: &str, referer: Option<&str>) -> Option<TenantId> {
    TenantRules::from_config().resolve(host, referer)
}

fn strip_port(host: &str) -> &str {
    // Bracketed IPv6 literals keep their colons
    if host.starts_with('[') {
        let end = host.find(']').map(|i| i + 1).unwrap_or(host.len());
        return &host[..end];
    }
    match host.rsplit_once(':') {
        Some((name, port)) if port.parse::<u16>().is_ok() => name,
        _ => host,
    }
}

/// Middleware that resolves the tenant from `Host`/`Referer` and injects a
/// [`TenantContext`] request extension. Resolution failure is non-fatal: the
/// request proceeds without a tenant and the backend decides what to do.
pub async fn tenant_middleware(headers: HeaderMap, mut request: Request, next: Next) -> Response {
    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    let referer = headers.get(header::REFERER).and_then(|v| v.to_str().ok());

    let tenant = resolve_tenant(host, referer);
    match &tenant {
        Some(t) => tracing::debug!("Tenant resolved: {}", t),
        None => tracing::debug!("No tenant resolvable from host '{}'", host),
    }

    request.extensions_mut().insert(TenantContext { tenant });
    next.run(request).await
}
