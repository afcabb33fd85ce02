//! Backend invocation.
//!
//! # Responsibilities
//! - Describe one outbound backend call (`OutboundCall`)
//! - Define the `Invoker` seam the auth interceptor wraps
//! - Forward calls to upstream services as JSON over HTTP
//!
//! # Design Decisions
//! - Upstream failures never escape as transport errors: every outcome is
//!   either a JSON payload or a `Status`
//! - Connection errors are `Unavailable`, deadline misses `DeadlineExceeded`
//! - No retries: a failed call is answered immediately

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderValue, Method, Request, Response};
use hyper::body::Incoming;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use serde_json::Value;
use url::Url;

use crate::config::ServiceConfig;
use crate::rpc::{Code, Status};

/// Upper bound on buffered upstream response bodies.
const MAX_UPSTREAM_BODY: usize = 4 * 1024 * 1024;

/// A single call about to be sent to a backend.
#[derive(Debug, Clone)]
pub struct OutboundCall {
    /// Target endpoint id, `/<service>/<method>`.
    pub endpoint: String,
    /// Metadata received from the caller.
    pub incoming: HeaderMap,
    /// Metadata to attach to the backend call.
    pub outgoing: HeaderMap,
    /// JSON request message.
    pub request: Value,
}

impl OutboundCall {
    pub fn new(endpoint: impl Into<String>, request: Value) -> Self {
        Self {
            endpoint: endpoint.into(),
            incoming: HeaderMap::new(),
            outgoing: HeaderMap::new(),
            request,
        }
    }

    /// Fully-qualified service name taken from the endpoint id.
    pub fn service(&self) -> Option<&str> {
        self.endpoint
            .strip_prefix('/')?
            .split_once('/')
            .map(|(service, _)| service)
    }
}

/// Sends an outbound call to a backend.
#[async_trait]
pub trait Invoker: Send + Sync {
    async fn invoke(&self, call: OutboundCall) -> Result<Value, Status>;
}

/// JSON-over-HTTP upstream: `POST http://<address>/<service>/<method>`.
pub struct HttpUpstream {
    client: Client<HttpConnector, Body>,
    services: HashMap<String, Url>,
    timeout: Duration,
}

impl HttpUpstream {
    /// Build the upstream table from the configured services.
    pub fn new(services: &[ServiceConfig], timeout: Duration) -> Result<Self, url::ParseError> {
        let mut table = HashMap::new();
        for service in services {
            let base = Url::parse(&format!("http://{}/", service.address))?;
            table.insert(service.name.clone(), base);
        }

        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());

        Ok(Self {
            client,
            services: table,
            timeout,
        })
    }

    fn target(&self, call: &OutboundCall) -> Result<Url, Status> {
        let service = call.service().ok_or_else(|| {
            Status::new(Code::Unimplemented, format!("malformed endpoint {}", call.endpoint))
        })?;
        let base = self.services.get(service).ok_or_else(|| {
            Status::new(Code::Unimplemented, format!("unknown service {}", service))
        })?;
        base.join(call.endpoint.trim_start_matches('/'))
            .map_err(|e| Status::internal(format!("invalid upstream url: {}", e)))
    }

    async fn send(&self, call: OutboundCall) -> Result<Value, Status> {
        let url = self.target(&call)?;
        let body = serde_json::to_vec(&call.request)
            .map_err(|e| Status::internal(format!("request encode failed: {}", e)))?;

        let mut builder = Request::builder()
            .method(Method::POST)
            .uri(url.as_str())
            .header(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(headers) = builder.headers_mut() {
            for (name, value) in call.outgoing.iter() {
                headers.append(name.clone(), value.clone());
            }
        }
        let request = builder
            .body(Body::from(body))
            .map_err(|e| Status::internal(format!("request build failed: {}", e)))?;

        let response: Response<Incoming> = self.client.request(request).await.map_err(|e| {
            tracing::warn!(endpoint = %call.endpoint, error = %e, "Upstream unreachable");
            Status::unavailable(format!("upstream unavailable: {}", e))
        })?;

        let status = response.status();
        let bytes = axum::body::to_bytes(Body::new(response.into_body()), MAX_UPSTREAM_BODY)
            .await
            .map_err(|e| Status::unavailable(format!("upstream body read failed: {}", e)))?;

        if status.is_success() {
            if bytes.is_empty() {
                return Ok(Value::Object(Default::default()));
            }
            return serde_json::from_slice(&bytes)
                .map_err(|e| Status::internal(format!("malformed upstream payload: {}", e)));
        }

        match serde_json::from_slice::<Status>(&bytes) {
            Ok(decoded) if decoded.code != Code::Ok => Err(decoded),
            _ => Err(Status::new(
                Code::from_http_status(status),
                status.canonical_reason().unwrap_or("upstream error"),
            )),
        }
    }
}

#[async_trait]
impl Invoker for HttpUpstream {
    async fn invoke(&self, call: OutboundCall) -> Result<Value, Status> {
        let endpoint = call.endpoint.clone();
        match tokio::time::timeout(self.timeout, self.send(call)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(endpoint = %endpoint, timeout = ?self.timeout, "Upstream deadline exceeded");
                Err(Status::new(Code::DeadlineExceeded, "upstream request timed out"))
            }
        }
    }
}
