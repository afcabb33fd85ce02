//! Authentication at the backend call boundary.
//!
//! Every outbound call passes through [`AuthInterceptor::intercept`] before it
//! reaches the upstream. Exempt endpoints go through untouched; everything
//! else needs a `Bearer` token whose principal is then attached to the
//! outgoing metadata.

use std::sync::Arc;

use axum::http::{header, HeaderMap, HeaderName, HeaderValue};
use serde_json::Value;

use crate::auth::endpoints::EndpointRegistry;
use crate::auth::jwt::CredentialValidator;
use crate::error::GatewayError;
use crate::observability::metrics;
use crate::rpc::{Invoker, OutboundCall};

/// Alias some HTTP front ends use when forwarding the authorization header.
pub const GATEWAY_AUTHORIZATION: &str = "grpcgateway-authorization";

const BEARER_PREFIX: &str = "Bearer ";

pub struct AuthInterceptor {
    validator: Arc<CredentialValidator>,
    registry: Arc<EndpointRegistry>,
    principal_key: HeaderName,
}

impl AuthInterceptor {
    pub fn new(
        validator: Arc<CredentialValidator>,
        registry: Arc<EndpointRegistry>,
        principal_key: HeaderName,
    ) -> Self {
        Self {
            validator,
            registry,
            principal_key,
        }
    }

    /// Authenticate a call, returning it with the principal attached.
    pub fn intercept(&self, mut call: OutboundCall) -> Result<OutboundCall, GatewayError> {
        if self.registry.contains(&call.endpoint) {
            tracing::debug!(endpoint = %call.endpoint, "Public endpoint, skipping authentication");
            return Ok(call);
        }

        let principal = self
            .authenticate(&call)
            .inspect_err(|err| {
                tracing::warn!(endpoint = %call.endpoint, reason = %err, "Authentication failed");
                metrics::record_auth_failure(failure_reason(err));
            })?;

        tracing::debug!(endpoint = %call.endpoint, principal = %principal, "Authentication successful");

        let value = HeaderValue::from_str(&principal).map_err(|_| GatewayError::InvalidToken)?;
        call.outgoing.append(self.principal_key.clone(), value);
        Ok(call)
    }

    fn authenticate(&self, call: &OutboundCall) -> Result<String, GatewayError> {
        let credential = find_credential(&call.incoming)
            .or_else(|| find_credential(&call.outgoing))
            .ok_or(GatewayError::MissingCredential)?;

        let token = credential
            .to_str()
            .ok()
            .and_then(|value| value.strip_prefix(BEARER_PREFIX))
            .ok_or(GatewayError::MalformedCredential)?;

        Ok(self.validator.extract_principal(token)?)
    }
}

fn find_credential(metadata: &HeaderMap) -> Option<&HeaderValue> {
    metadata
        .get(header::AUTHORIZATION)
        .or_else(|| metadata.get(GATEWAY_AUTHORIZATION))
}

fn failure_reason(err: &GatewayError) -> &'static str {
    match err {
        GatewayError::MissingCredential => "missing",
        GatewayError::MalformedCredential => "malformed",
        GatewayError::ExpiredToken => "expired",
        _ => "invalid",
    }
}

/// An [`Invoker`] with authentication in front of it.
pub struct InterceptedInvoker {
    interceptor: AuthInterceptor,
    inner: Arc<dyn Invoker>,
}

impl InterceptedInvoker {
    pub fn new(interceptor: AuthInterceptor, inner: Arc<dyn Invoker>) -> Self {
        Self { interceptor, inner }
    }

    pub async fn call(&self, call: OutboundCall) -> Result<Value, GatewayError> {
        let call = self.interceptor.intercept(call)?;
        Ok(self.inner.invoke(call).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::sign;
    use crate::rpc::Status;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const SECRET: &[u8] = b"interceptor-secret";
    const PUBLIC: &str = "/user.v1.MerchantService/LoginMerchant";
    const PROTECTED: &str = "/user.v1.MerchantService/GetMerchant";

    fn interceptor() -> AuthInterceptor {
        AuthInterceptor::new(
            Arc::new(CredentialValidator::new(SECRET, "merchant_id")),
            Arc::new([PUBLIC.to_string()].into_iter().collect()),
            HeaderName::from_static("x-merchant-id"),
        )
    }

    fn token(exp_offset: i64) -> String {
        let exp = time::OffsetDateTime::now_utc().unix_timestamp() + exp_offset;
        sign("HS256", &json!({ "merchant_id": "m-7", "exp": exp }), SECRET)
    }

    fn call(endpoint: &str, authorization: Option<String>) -> OutboundCall {
        let mut call = OutboundCall::new(endpoint, json!({}));
        if let Some(value) = authorization {
            call.incoming
                .insert(header::AUTHORIZATION, HeaderValue::from_str(&value).unwrap());
        }
        call
    }

    #[test]
    fn test_public_endpoint_is_untouched() {
        let out = interceptor().intercept(call(PUBLIC, None)).unwrap();
        assert!(out.outgoing.is_empty());
    }

    #[test]
    fn test_missing_and_malformed() {
        let err = interceptor().intercept(call(PROTECTED, None)).unwrap_err();
        assert_eq!(err.to_string(), "missing authorization");

        let err = interceptor()
            .intercept(call(PROTECTED, Some(format!("Token {}", token(60)))))
            .unwrap_err();
        assert_eq!(err.to_string(), "invalid authorization header format");
    }

    #[test]
    fn test_expired_and_invalid_keep_distinct_messages() {
        let err = interceptor()
            .intercept(call(PROTECTED, Some(format!("Bearer {}", token(-60)))))
            .unwrap_err();
        assert_eq!(err.to_string(), "token has expired");

        let err = interceptor()
            .intercept(call(PROTECTED, Some("Bearer not.a.token".into())))
            .unwrap_err();
        assert_eq!(err.to_string(), "invalid token");
    }

    #[test]
    fn test_principal_is_appended_to_outgoing() {
        let mut c = call(PROTECTED, Some(format!("Bearer {}", token(60))));
        c.outgoing
            .insert("x-request-id", HeaderValue::from_static("req-1"));

        let out = interceptor().intercept(c).unwrap();
        assert_eq!(out.outgoing["x-merchant-id"], "m-7");
        assert_eq!(out.outgoing["x-request-id"], "req-1");
    }

    #[test]
    fn test_outgoing_and_alias_credentials() {
        let mut c = call(PROTECTED, None);
        c.outgoing.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", token(60))).unwrap(),
        );
        assert!(interceptor().intercept(c).is_ok());

        let mut c = call(PROTECTED, None);
        c.incoming.insert(
            GATEWAY_AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", token(60))).unwrap(),
        );
        assert!(interceptor().intercept(c).is_ok());
    }

    struct Counting(AtomicUsize);

    #[async_trait]
    impl Invoker for Counting {
        async fn invoke(&self, call: OutboundCall) -> Result<Value, Status> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(json!({ "endpoint": call.endpoint }))
        }
    }

    #[tokio::test]
    async fn test_rejected_calls_never_reach_backend() {
        let backend = Arc::new(Counting(AtomicUsize::new(0)));
        let invoker = InterceptedInvoker::new(interceptor(), backend.clone());

        assert!(invoker.call(call(PROTECTED, None)).await.is_err());
        assert_eq!(backend.0.load(Ordering::SeqCst), 0);

        let value = invoker.call(call(PUBLIC, None)).await.unwrap();
        assert_eq!(value["endpoint"], PUBLIC);
        assert_eq!(backend.0.load(Ordering::SeqCst), 1);
    }
}
