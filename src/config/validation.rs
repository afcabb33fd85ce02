//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check value ranges (tier rates and bursts, timeouts)
//! - Detect duplicate services and conflicting HTTP bindings
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;

use crate::config::schema::GatewayConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.auth.secret_key.is_empty() {
        errors.push(ValidationError::new("auth.secret_key", "must not be empty"));
    }
    if config.auth.principal_claim.is_empty() {
        errors.push(ValidationError::new("auth.principal_claim", "must not be empty"));
    }
    if axum::http::HeaderName::from_bytes(config.auth.principal_metadata_key.as_bytes()).is_err() {
        errors.push(ValidationError::new(
            "auth.principal_metadata_key",
            "must be a valid lowercase header name",
        ));
    }

    if config.server.request_timeout_secs == 0 {
        errors.push(ValidationError::new("server.request_timeout_secs", "must be > 0"));
    }
    if config.server.upstream_timeout_secs == 0 {
        errors.push(ValidationError::new("server.upstream_timeout_secs", "must be > 0"));
    }

    if config.docs.enabled {
        if config.docs.openapi_dir.is_empty() {
            errors.push(ValidationError::new("docs.openapi_dir", "must not be empty"));
        }
        for (i, document) in config.docs.documents.iter().enumerate() {
            if !document.url.starts_with("/openapi/") {
                errors.push(ValidationError::new(
                    format!("docs.documents[{}].url", i),
                    "must start with /openapi/",
                ));
            }
        }
    }

    let limits = &config.rate_limit;
    if limits.enabled {
        for (field, value) in [
            ("rate_limit.public_rps", limits.public_rps),
            ("rate_limit.public_burst", limits.public_burst),
            ("rate_limit.auth_rps", limits.auth_rps),
            ("rate_limit.auth_burst", limits.auth_burst),
        ] {
            if value == 0 {
                errors.push(ValidationError::new(field, "must be > 0 when rate limiting is enabled"));
            }
        }
        if limits.store_timeout_ms == 0 {
            errors.push(ValidationError::new("rate_limit.store_timeout_ms", "must be > 0"));
        }
    }

    let mut services = HashSet::new();
    let mut bindings = HashSet::new();
    for (i, service) in config.services.iter().enumerate() {
        let prefix = format!("services[{}]", i);
        if service.name.is_empty() {
            errors.push(ValidationError::new(format!("{}.name", prefix), "must not be empty"));
        } else if !services.insert(service.name.as_str()) {
            errors.push(ValidationError::new(
                format!("{}.name", prefix),
                format!("duplicate service {}", service.name),
            ));
        }
        if service.address.is_empty() {
            errors.push(ValidationError::new(format!("{}.address", prefix), "must not be empty"));
        }

        for (j, method) in service.methods.iter().enumerate() {
            let Some(rule) = &method.http else { continue };
            let field = format!("{}.methods[{}].http", prefix, j);
            if !rule.path.starts_with('/') {
                errors.push(ValidationError::new(format!("{}.path", field), "must start with '/'"));
            }
            if axum::http::Method::from_bytes(rule.method.to_ascii_uppercase().as_bytes()).is_err() {
                errors.push(ValidationError::new(format!("{}.method", field), "invalid HTTP method"));
            }
            if !bindings.insert((rule.method.to_ascii_uppercase(), rule.path.clone())) {
                errors.push(ValidationError::new(
                    field,
                    format!("{} {} is bound twice", rule.method, rule.path),
                ));
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
