use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub backend: BackendConfig,
    pub tenant: TenantConfig,
    pub http: HttpConfig,
    pub session: SessionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

/// Where proxied requests go.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    pub base_url: String,
    pub login_path: String,
    pub verify_otp_path: String,
    pub refresh_path: String,
}

/// Rules for deriving a tenant id from the inbound host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantConfig {
    /// Multi-level wildcard suffixes (PaaS domains) where the first label is
    /// always the tenant, e.g. `acme.myproject.vercel.app`.
    pub wildcard_suffixes: Vec<String>,
    /// First labels that can never be a tenant id.
    pub reserved_labels: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub pool_max_idle_per_host: usize,
    pub pool_idle_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Tokens at or below this length are treated as garbage and not attached.
    pub min_token_len: usize,
    /// Service name reported in the x-client-info diagnostic header.
    pub client_name: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        // Backend overrides
        if let Ok(v) = env::var("BACKEND_BASE_URL") {
            self.backend.base_url = v;
        }
        if let Ok(v) = env::var("BACKEND_LOGIN_PATH") {
            self.backend.login_path = v;
        }
        if let Ok(v) = env::var("BACKEND_VERIFY_OTP_PATH") {
            self.backend.verify_otp_path = v;
        }
        if let Ok(v) = env::var("BACKEND_REFRESH_PATH") {
            self.backend.refresh_path = v;
        }

        // Tenant overrides
        if let Ok(v) = env::var("TENANT_WILDCARD_SUFFIXES") {
            self.tenant.wildcard_suffixes = v.split(',').map(|s| s.trim().to_string()).collect();
        }
        if let Ok(v) = env::var("TENANT_RESERVED_LABELS") {
            self.tenant.reserved_labels = v.split(',').map(|s| s.trim().to_string()).collect();
        }

        // HTTP overrides
        if let Ok(v) = env::var("HTTP_CONNECT_TIMEOUT_SECS") {
            self.http.connect_timeout_secs = v.parse().unwrap_or(self.http.connect_timeout_secs);
        }
        if let Ok(v) = env::var("HTTP_REQUEST_TIMEOUT_SECS") {
            self.http.request_timeout_secs = v.parse().unwrap_or(self.http.request_timeout_secs);
        }
        if let Ok(v) = env::var("HTTP_POOL_MAX_IDLE_PER_HOST") {
            self.http.pool_max_idle_per_host =
                v.parse().unwrap_or(self.http.pool_max_idle_per_host);
        }
        if let Ok(v) = env::var("HTTP_POOL_IDLE_TIMEOUT_SECS") {
            self.http.pool_idle_timeout_secs =
                v.parse().unwrap_or(self.http.pool_idle_timeout_secs);
        }

        // Session overrides
        if let Ok(v) = env::var("SESSION_MIN_TOKEN_LEN") {
            self.session.min_token_len = v.parse().unwrap_or(self.session.min_token_len);
        }
        if let Ok(v) = env::var("SESSION_CLIENT_NAME") {
            self.session.client_name = v;
        }

        self
    }

    fn base() -> Self {
        Self {
            environment: Environment::Development,
            backend: BackendConfig {
                base_url: "http://localhost:8000".to_string(),
                login_path: "/auth/login".to_string(),
                verify_otp_path: "/auth/verify-otp".to_string(),
                refresh_path: "/auth/refresh".to_string(),
            },
            tenant: TenantConfig {
                wildcard_suffixes: vec![
                    "vercel.app".to_string(),
                    "netlify.app".to_string(),
                    "herokuapp.com".to_string(),
                ],
                reserved_labels: vec!["www".to_string(), "localhost".to_string()],
            },
            http: HttpConfig {
                connect_timeout_secs: 20,
                request_timeout_secs: 60,
                pool_max_idle_per_host: 16,
                pool_idle_timeout_secs: 90,
            },
            session: SessionConfig {
                min_token_len: 10,
                client_name: "caregate".to_string(),
            },
        }
    }

    fn development() -> Self {
        Self::base()
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            backend: BackendConfig {
                base_url: "https://api-staging.joee.com.ng".to_string(),
                ..Self::base().backend
            },
            ..Self::base()
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            backend: BackendConfig {
                base_url: "https://api.joee.com.ng".to_string(),
                ..Self::base().backend
            },
            http: HttpConfig {
                connect_timeout_secs: 10,
                request_timeout_secs: 30,
                pool_max_idle_per_host: 32,
                pool_idle_timeout_secs: 90,
            },
            ..Self::base()
        }
    }
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

// Convenience function for accessing config
pub fn config() -> &'static AppConfig {
    &CONFIG
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_development_config() {
        let config = AppConfig::development();
        assert_eq!(config.backend.base_url, "http://localhost:8000");
        assert_eq!(config.session.min_token_len, 10);
        assert!(config
            .tenant
            .wildcard_suffixes
            .iter()
            .any(|s| s == "vercel.app"));
    }

    #[test]
    fn test_default_production_config() {
        let config = AppConfig::production();
        assert!(config.backend.base_url.starts_with("https://"));
        assert_eq!(config.http.connect_timeout_secs, 10);
        assert_eq!(
            config.tenant.reserved_labels,
            vec!["www".to_string(), "localhost".to_string()]
        );
    }
}
