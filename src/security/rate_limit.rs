//! Rate limiting middleware with two quota tiers.
//!
//! # Responsibilities
//! - Derive a limiter key per request (credential or client address)
//! - Pick the tier: authenticated callers get the larger quota
//! - Consult the counter store and translate its answer into headers
//! - Fail open when the store is unreachable or slow
//!
//! # Design Decisions
//! - The tier is chosen from the mere presence of an Authorization header;
//!   the credential is not verified here
//! - Store calls are bounded by a short timeout so a slow store cannot
//!   stall admission

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{header, HeaderMap, HeaderValue, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::config::RateLimitConfig;
use crate::error::GatewayError;
use crate::observability::metrics;
use crate::security::client_ip::client_address;
use crate::security::counter_store::{CounterStore, Limit, StoreError};

pub const X_RATELIMIT_LIMIT: &str = "x-ratelimit-limit";
pub const X_RATELIMIT_REMAINING: &str = "x-ratelimit-remaining";
pub const X_RATELIMIT_RESET: &str = "x-ratelimit-reset";

const AUTH_KEY_PREFIX: &str = "rate:auth:";
const IP_KEY_PREFIX: &str = "rate:ip:";

/// A named quota.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuotaTier {
    pub name: &'static str,
    pub requests_per_second: u32,
    pub burst: u32,
}

impl QuotaTier {
    fn limit(&self) -> Limit {
        Limit::per_second(self.requests_per_second, self.burst)
    }
}

/// Outcome of one limiter check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LimitDecision {
    pub allowed: bool,
    /// The tier's sustained rate, requests per second.
    pub limit: u32,
    pub remaining: i64,
    pub reset_after_ms: u64,
    /// Whole seconds, rounded up, at least 1. Zero when allowed.
    pub retry_after_sec: u64,
}

impl LimitDecision {
    /// Write the `X-RateLimit-*` headers, plus `Retry-After` on denials.
    pub fn apply_headers(&self, headers: &mut HeaderMap) {
        headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(self.limit));
        headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(self.remaining.max(0)));
        headers.insert(X_RATELIMIT_RESET, HeaderValue::from(self.reset_after_ms));
        if !self.allowed {
            headers.insert(header::RETRY_AFTER, HeaderValue::from(self.retry_after_sec));
        }
    }
}

/// Admission control in front of every gateway route.
pub struct RateLimiter {
    enabled: bool,
    authenticated: QuotaTier,
    anonymous: QuotaTier,
    store: Arc<dyn CounterStore>,
    store_timeout: Duration,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig, store: Arc<dyn CounterStore>) -> Self {
        Self {
            enabled: config.enabled,
            authenticated: QuotaTier {
                name: "authenticated",
                requests_per_second: config.auth_rps,
                burst: config.auth_burst,
            },
            anonymous: QuotaTier {
                name: "anonymous",
                requests_per_second: config.public_rps,
                burst: config.public_burst,
            },
            store,
            store_timeout: Duration::from_millis(config.store_timeout_ms),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Pick the limiter key and the quota tier for a request.
    pub fn classify(&self, headers: &HeaderMap, peer: Option<&str>) -> (String, &QuotaTier) {
        let credential = headers
            .get(header::AUTHORIZATION)
            .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
            .filter(|v| !v.is_empty());

        match credential {
            Some(credential) => (format!("{}{}", AUTH_KEY_PREFIX, credential), &self.authenticated),
            None => (
                format!("{}{}", IP_KEY_PREFIX, client_address(headers, peer)),
                &self.anonymous,
            ),
        }
    }

    /// Consume one unit of the caller's quota.
    pub async fn check(
        &self,
        headers: &HeaderMap,
        peer: Option<&str>,
    ) -> Result<(LimitDecision, &QuotaTier), StoreError> {
        let (key, tier) = self.classify(headers, peer);
        let limit = tier.limit();

        let admission = tokio::time::timeout(self.store_timeout, self.store.allow(&key, &limit))
            .await
            .map_err(|_| StoreError::Timeout(self.store_timeout))??;

        let retry_after_sec = if admission.allowed {
            0
        } else {
            let retry = admission.retry_after.unwrap_or_default();
            ceil_secs(retry).max(1)
        };

        let decision = LimitDecision {
            allowed: admission.allowed,
            limit: tier.requests_per_second,
            remaining: admission.remaining.max(0),
            reset_after_ms: ceil_millis(admission.reset_after),
            retry_after_sec,
        };
        Ok((decision, tier))
    }
}

fn ceil_secs(d: Duration) -> u64 {
    d.as_secs() + u64::from(d.subsec_nanos() > 0)
}

fn ceil_millis(d: Duration) -> u64 {
    let millis = d.as_millis();
    let rounded = millis + u128::from(d.as_nanos() % 1_000_000 > 0);
    u64::try_from(rounded).unwrap_or(u64::MAX)
}

/// Middleware function for tiered rate limiting.
pub async fn rate_limit_middleware(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if !limiter.is_enabled() {
        return next.run(request).await;
    }

    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.to_string());

    match limiter.check(request.headers(), peer.as_deref()).await {
        Ok((decision, _)) if decision.allowed => {
            let mut response = next.run(request).await;
            decision.apply_headers(response.headers_mut());
            response
        }
        Ok((decision, tier)) => {
            tracing::warn!(
                tier = tier.name,
                path = %request.uri().path(),
                retry_after = decision.retry_after_sec,
                "Rate limit exceeded"
            );
            metrics::record_rate_limited(tier.name);
            GatewayError::RateLimited(decision).into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "Rate limit store failed, allowing request");
            metrics::record_rate_limit_fail_open();
            next.run(request).await
        }
    }
}
