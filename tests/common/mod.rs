//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    routing::post,
    Json, Router,
};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde_json::{json, Value};
use sha2::Sha256;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use admission_gateway::config::{GatewayConfig, HttpRuleConfig, MethodConfig, ServiceConfig};
use admission_gateway::security::{Admission, CounterStore, Limit, StoreError};
use admission_gateway::{HttpServer, Shutdown};

pub const SECRET: &str = "integration-secret";
pub const SERVICE: &str = "user.v1.MerchantService";

/// A mock backend service speaking JSON over HTTP.
pub struct MockUpstream {
    pub addr: SocketAddr,
    pub hits: Arc<AtomicUsize>,
}

impl MockUpstream {
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

/// Start a mock upstream on an ephemeral port.
///
/// `FindMerchant` answers a not-found status; every other method echoes the
/// endpoint, the propagated metadata and the request message.
pub async fn start_mock_upstream() -> MockUpstream {
    let hits = Arc::new(AtomicUsize::new(0));
    let app = Router::new()
        .route("/{service}/{method}", post(upstream_handler))
        .with_state(hits.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    MockUpstream { addr, hits }
}

async fn upstream_handler(
    State(hits): State<Arc<AtomicUsize>>,
    Path((service, method)): Path<(String, String)>,
    headers: HeaderMap,
    Json(request): Json<Value>,
) -> (StatusCode, Json<Value>) {
    hits.fetch_add(1, Ordering::SeqCst);

    if method == "FindMerchant" {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({ "code": 5, "message": "merchant not found", "details": [] })),
        );
    }

    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(|v| Value::String(v.to_string()))
            .unwrap_or(Value::Null)
    };

    (
        StatusCode::OK,
        Json(json!({
            "endpoint": format!("/{}/{}", service, method),
            "merchant_id": header("x-merchant-id"),
            "lang": header("x-lang"),
            "request_id": header("x-request-id"),
            "request": request,
        })),
    )
}

fn method(name: &str, verb: &str, path: &str, public: bool) -> MethodConfig {
    let mut options = std::collections::BTreeMap::new();
    if public {
        options.insert("auth.v1.public_endpoint".to_string(), Value::Bool(true));
    }
    MethodConfig {
        name: name.into(),
        http: Some(HttpRuleConfig {
            method: verb.into(),
            path: path.into(),
        }),
        options,
    }
}

/// Gateway configuration pointing at `upstream`.
pub fn gateway_config(upstream: SocketAddr) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.auth.secret_key = SECRET.into();
    config.rate_limit.public_rps = 1;
    config.rate_limit.public_burst = 5;
    config.services.push(ServiceConfig {
        name: SERVICE.into(),
        address: upstream.to_string(),
        methods: vec![
            method("LoginMerchant", "POST", "/v1/merchants/login", true),
            method("GetMerchant", "GET", "/v1/merchants/{id}", false),
            method("FindMerchant", "GET", "/v1/lookup/{id}", false),
        ],
    });
    config
}

pub struct TestGateway {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub handle: JoinHandle<Result<(), std::io::Error>>,
}

impl TestGateway {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

/// Start the gateway on an ephemeral port.
pub async fn spawn_gateway(config: GatewayConfig, store: Arc<dyn CounterStore>) -> TestGateway {
    let server = HttpServer::new(&config, store).unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let signal = shutdown.listener();
    let handle = tokio::spawn(async move { server.run(listener, signal).await });

    TestGateway {
        addr,
        shutdown,
        handle,
    }
}

/// Sign an HS256 token for `merchant_id` expiring `ttl_secs` from now.
pub fn sign_token(merchant_id: &str, ttl_secs: i64) -> String {
    let exp = time::OffsetDateTime::now_utc().unix_timestamp() + ttl_secs;
    sign_claims(&json!({ "merchant_id": merchant_id, "exp": exp }), SECRET.as_bytes())
}

pub fn sign_claims(claims: &Value, secret: &[u8]) -> String {
    let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    let input = format!("{}.{}", header, payload);

    let mut mac = <Hmac<Sha256> as Mac>::new_from_slice(secret).unwrap();
    mac.update(input.as_bytes());
    let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());
    format!("{}.{}", input, signature)
}

/// A counter store that is always down.
pub struct BrokenStore;

#[async_trait]
impl CounterStore for BrokenStore {
    async fn allow(&self, _key: &str, _limit: &Limit) -> Result<Admission, StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }
}
