//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// HTTP server settings.
    pub server: ServerConfig,

    /// Log level and format.
    pub logging: LoggingConfig,

    /// Credential verification and identity propagation.
    pub auth: AuthConfig,

    /// Admission control tiers.
    pub rate_limit: RateLimitConfig,

    /// Shared counter store backing the rate limiter.
    pub counter_store: CounterStoreConfig,

    /// Cross-origin settings.
    pub cors: CorsConfig,

    /// Metrics settings.
    pub observability: ObservabilityConfig,

    /// OpenAPI documents and the Swagger UI page.
    pub docs: DocsConfig,

    /// Backend services and their method metadata.
    pub services: Vec<ServiceConfig>,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Application name reported in logs.
    pub app_name: String,

    /// Deployment environment ("dev", "staging", "prod").
    pub app_env: String,

    /// Bind address (e.g., "0.0.0.0:8081").
    pub bind_address: String,

    /// Total time allowed for one request, in seconds.
    pub request_timeout_secs: u64,

    /// Deadline for a single backend call, in seconds.
    pub upstream_timeout_secs: u64,

    /// Maximum request body size in bytes.
    pub max_body_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            app_name: "admission-gateway".to_string(),
            app_env: "dev".to_string(),
            bind_address: "0.0.0.0:8081".to_string(),
            request_timeout_secs: 15,
            upstream_timeout_secs: 10,
            max_body_size: 2 * 1024 * 1024, // 2MB
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` takes precedence.
    pub level: String,

    /// Output encoding: "json" or "pretty".
    pub encoding: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            encoding: "json".to_string(),
        }
    }
}

/// Credential verification configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Shared HMAC secret used to verify bearer tokens.
    pub secret_key: String,

    /// Claim holding the principal identifier.
    pub principal_claim: String,

    /// Metadata key carrying the principal to backends.
    pub principal_metadata_key: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            secret_key: String::new(),
            principal_claim: "merchant_id".to_string(),
            principal_metadata_key: "x-merchant-id".to_string(),
        }
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting.
    pub enabled: bool,

    /// Requests per second for callers without credentials (per IP).
    pub public_rps: u32,

    /// Burst capacity for callers without credentials.
    pub public_burst: u32,

    /// Requests per second for callers presenting a credential.
    pub auth_rps: u32,

    /// Burst capacity for callers presenting a credential.
    pub auth_burst: u32,

    /// Deadline for one counter store round trip, in milliseconds.
    pub store_timeout_ms: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            public_rps: 10,
            public_burst: 20,
            auth_rps: 100,
            auth_burst: 200,
            store_timeout_ms: 100,
        }
    }
}

/// Which counter store backs the limiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CounterStoreKind {
    Memory,
    Redis,
}

/// Counter store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CounterStoreConfig {
    /// Store implementation.
    pub kind: CounterStoreKind,

    /// Redis connection URL (used when `kind = "redis"`).
    pub redis_url: String,

    /// Prefix prepended to every counter key in the store.
    pub key_prefix: String,
}

impl Default for CounterStoreConfig {
    fn default() -> Self {
        Self {
            kind: CounterStoreKind::Redis,
            redis_url: "redis://127.0.0.1:6379/0".to_string(),
            key_prefix: String::new(),
        }
    }
}

/// CORS configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CorsConfig {
    /// Enable the CORS layer.
    pub enabled: bool,

    /// Allowed origins. Empty mirrors the request origin.
    pub allowed_origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            allowed_origins: Vec::new(),
        }
    }
}

/// API documentation surface.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DocsConfig {
    /// Serve `/openapi/` and `/swagger-ui`.
    pub enabled: bool,

    /// Directory holding the OpenAPI documents.
    pub openapi_dir: String,

    /// Page title of the Swagger UI.
    pub title: String,

    /// Documents listed in the UI. Empty lists every document found in `openapi_dir`.
    pub documents: Vec<DocumentConfig>,
}

impl Default for DocsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            openapi_dir: "openapi".to_string(),
            title: "API Documentation".to_string(),
            documents: Vec::new(),
        }
    }
}

/// One entry of the Swagger UI document picker.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct DocumentConfig {
    /// URL under `/openapi/`, e.g. "/openapi/user/v1/user.swagger.json".
    pub url: String,

    /// Display name, e.g. "Merchant API".
    pub name: String,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// A backend service reachable through the gateway.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceConfig {
    /// Fully-qualified service name (e.g., "user.v1.MerchantService").
    pub name: String,

    /// Upstream address (e.g., "127.0.0.1:8080").
    pub address: String,

    /// Method definitions.
    #[serde(default)]
    pub methods: Vec<MethodConfig>,
}

/// A method of a backend service.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MethodConfig {
    /// Method name (e.g., "LoginMerchant").
    pub name: String,

    /// HTTP binding. Methods without one are not reachable over HTTP.
    #[serde(default)]
    pub http: Option<HttpRuleConfig>,

    /// Method options from the service definition, keyed by option name.
    #[serde(default)]
    pub options: BTreeMap<String, serde_json::Value>,
}

/// HTTP binding of a method.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HttpRuleConfig {
    /// HTTP verb (GET, POST, ...).
    pub method: String,

    /// Path template, e.g. "/v1/merchants/{id}".
    pub path: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_tiers() {
        let config = GatewayConfig::default();
        assert!(config.rate_limit.enabled);
        assert_eq!(config.rate_limit.public_rps, 10);
        assert_eq!(config.rate_limit.public_burst, 20);
        assert_eq!(config.rate_limit.auth_rps, 100);
        assert_eq!(config.rate_limit.auth_burst, 200);
        assert_eq!(config.auth.principal_metadata_key, "x-merchant-id");
        assert!(!config.docs.enabled);
    }

    #[test]
    fn test_parse_docs_section() {
        let raw = r#"
            [docs]
            enabled = true
            openapi_dir = "/srv/openapi"

            [[docs.documents]]
            url = "/openapi/user/v1/user.swagger.json"
            name = "Merchant API"
        "#;
        let config: GatewayConfig = toml::from_str(raw).unwrap();

        assert!(config.docs.enabled);
        assert_eq!(config.docs.openapi_dir, "/srv/openapi");
        assert_eq!(config.docs.title, "API Documentation");
        assert_eq!(config.docs.documents[0].name, "Merchant API");
    }

    #[test]
    fn test_parse_services_with_options() {
        let raw = r#"
            [auth]
            secret_key = "s3cret"

            [counter_store]
            kind = "memory"

            [[services]]
            name = "user.v1.MerchantService"
            address = "127.0.0.1:8080"

            [[services.methods]]
            name = "LoginMerchant"
            http = { method = "POST", path = "/v1/merchants/login" }
            options = { "auth.v1.public_endpoint" = true }

            [[services.methods]]
            name = "GetMerchant"
            http = { method = "GET", path = "/v1/merchants/{id}" }
        "#;
        let config: GatewayConfig = toml::from_str(raw).unwrap();

        assert_eq!(config.counter_store.kind, CounterStoreKind::Memory);
        assert_eq!(config.services.len(), 1);
        let methods = &config.services[0].methods;
        assert_eq!(methods.len(), 2);
        assert_eq!(
            methods[0].options.get("auth.v1.public_endpoint"),
            Some(&serde_json::Value::Bool(true))
        );
        assert!(methods[1].options.is_empty());
        assert_eq!(methods[1].http.as_ref().unwrap().path, "/v1/merchants/{id}");
    }
}
