//! HTTP server setup and the gateway handler.
//!
//! # Responsibilities
//! - Build the axum router with all middleware layers
//! - Translate HTTP requests into backend calls (route, body, metadata)
//! - Render every outcome through the envelope marshaler
//! - Serve with graceful shutdown
//!
//! # Design Decisions
//! - `/healthz` and the documentation routes sit outside the rate limiter
//! - Authentication runs inside the invoker, after routing, so the
//!   interceptor sees the endpoint id of the call being made
//! - Layer order (outermost first): request id, trace, id propagation,
//!   CORS, rate limit
//! - The request timeout is applied inside the gateway handler so an
//!   expired call still answers with a `DeadlineExceeded` envelope

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderName, HeaderValue, Method, Request},
    middleware,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use serde_json::{json, Map, Value};
use tokio::net::TcpListener;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::auth::{
    AuthInterceptor, CredentialValidator, EndpointClassifier, InterceptedInvoker, StaticDescriptors,
};
use crate::config::{CorsConfig, GatewayConfig};
use crate::http::docs;
use crate::http::envelope::{Marshaler, Outcome};
use crate::http::request::{annotate, MakeRequestUuid, X_REQUEST_ID};
use crate::lifecycle::ShutdownListener;
use crate::observability::metrics;
use crate::routing::RouteTable;
use crate::rpc::{Code, HttpUpstream, Invoker, OutboundCall, Status};
use crate::security::{rate_limit_middleware, CounterStore, RateLimiter};

const DEFAULT_PRINCIPAL_KEY: &str = "x-merchant-id";

/// Application state injected into the gateway handler.
#[derive(Clone)]
pub struct AppState {
    pub routes: Arc<RouteTable>,
    pub invoker: Arc<InterceptedInvoker>,
    pub marshaler: Marshaler,
    pub max_body_size: usize,
    /// Budget for reading the body and completing the backend call.
    pub request_timeout: Duration,
}

/// HTTP front end of the gateway.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    /// Create a server that forwards to the configured upstream services.
    pub fn new(config: &GatewayConfig, store: Arc<dyn CounterStore>) -> Result<Self, url::ParseError> {
        let upstream = HttpUpstream::new(
            &config.services,
            Duration::from_secs(config.server.upstream_timeout_secs),
        )?;
        Ok(Self::with_invoker(config, store, Arc::new(upstream)))
    }

    /// Create a server around any backend invoker.
    pub fn with_invoker(
        config: &GatewayConfig,
        store: Arc<dyn CounterStore>,
        backend: Arc<dyn Invoker>,
    ) -> Self {
        let classifier = EndpointClassifier::new(StaticDescriptors::from_services(&config.services));
        let registry = classifier.discover();
        tracing::info!(count = registry.len(), "Discovered public endpoints");
        metrics::set_public_endpoints(registry.len());

        let principal_key = HeaderName::from_bytes(config.auth.principal_metadata_key.as_bytes())
            .unwrap_or_else(|_| {
                tracing::warn!(
                    key = %config.auth.principal_metadata_key,
                    "Invalid principal metadata key, using default"
                );
                HeaderName::from_static(DEFAULT_PRINCIPAL_KEY)
            });

        let interceptor = AuthInterceptor::new(
            Arc::new(CredentialValidator::from_config(&config.auth)),
            registry,
            principal_key,
        );

        let routes = RouteTable::from_services(&config.services);
        tracing::info!(routes = routes.len(), services = config.services.len(), "Route table compiled");

        let state = AppState {
            routes: Arc::new(routes),
            invoker: Arc::new(InterceptedInvoker::new(interceptor, backend)),
            marshaler: Marshaler,
            max_body_size: config.server.max_body_size,
            request_timeout: Duration::from_secs(config.server.request_timeout_secs),
        };
        let limiter = Arc::new(RateLimiter::new(&config.rate_limit, store));

        Self {
            router: Self::build_router(config, state, limiter),
        }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(config: &GatewayConfig, state: AppState, limiter: Arc<RateLimiter>) -> Router {
        let gateway = Router::new()
            .fallback(gateway_handler)
            .with_state(state)
            .layer(middleware::from_fn_with_state(limiter, rate_limit_middleware));

        let mut router = Router::new().route("/healthz", get(healthz));
        if config.docs.enabled {
            router = router.merge(docs::docs_router(&config.docs));
        }
        let mut router = router.fallback_service(gateway);

        if config.cors.enabled {
            router = router.layer(cors_layer(&config.cors));
        }

        router
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                let request_id = request
                    .headers()
                    .get(X_REQUEST_ID)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("unknown");
                tracing::info_span!(
                    "request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = %request_id,
                )
            }))
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// The router, for driving the server in-process.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server until a shutdown signal arrives, then drain.
    pub async fn run(
        self,
        listener: TcpListener,
        shutdown: ShutdownListener,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                shutdown.wait().await;
                tracing::info!("Shutdown signal received, draining connections");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let origins = if config.allowed_origins.is_empty() {
        AllowOrigin::mirror_request()
    } else {
        AllowOrigin::list(
            config
                .allowed_origins
                .iter()
                .filter_map(|origin| HeaderValue::from_str(origin).ok()),
        )
    };

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
            Method::PATCH,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static("x-requested-with"),
        ])
        .allow_credentials(true)
}

async fn healthz() -> Response {
    Outcome::Success(json!({ "status": "serving" })).into_response()
}

/// Route the request, call the backend, wrap the outcome.
async fn gateway_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start = Instant::now();
    let (parts, body) = request.into_parts();
    let method = parts.method.as_str().to_string();
    let path = parts.uri.path().to_string();

    let Some(route) = state.routes.match_request(&parts.method, &path) else {
        tracing::warn!(method = %method, path = %path, "No route matched");
        metrics::record_request(&method, 404, "none", start);
        return state.marshaler.respond(Outcome::Failure(Status::not_found("Not Found")));
    };
    let endpoint = route.endpoint.to_string();
    let params = route.params;
    let query = parts.uri.query();
    let headers = parts.headers;

    let dispatch = async {
        let message = match axum::body::to_bytes(body, state.max_body_size).await {
            Ok(bytes) => build_message(&state.marshaler, &bytes, query, params),
            Err(e) => Err(Status::invalid_argument(format!("failed to read request body: {}", e))),
        };

        match message {
            Ok(message) => {
                let mut call = OutboundCall::new(endpoint.clone(), message);
                call.outgoing = annotate(&headers);
                call.incoming = headers;

                tracing::debug!(endpoint = %endpoint, "Invoking backend");
                match state.invoker.call(call).await {
                    Ok(payload) => Outcome::Success(payload),
                    Err(err) => {
                        tracing::debug!(endpoint = %endpoint, error = %err, "Call failed");
                        Outcome::Failure(err.status())
                    }
                }
            }
            Err(status) => {
                tracing::warn!(endpoint = %endpoint, error = %status, "Bad request");
                Outcome::Failure(status)
            }
        }
    };

    let outcome = match tokio::time::timeout(state.request_timeout, dispatch).await {
        Ok(outcome) => outcome,
        Err(_) => {
            tracing::warn!(
                endpoint = %endpoint,
                timeout_ms = state.request_timeout.as_millis() as u64,
                "Request timed out"
            );
            Outcome::Failure(Status::new(Code::DeadlineExceeded, "request timed out"))
        }
    };

    let response = state.marshaler.respond(outcome);
    metrics::record_request(&method, response.status().as_u16(), &endpoint, start);
    response
}

/// Merge body, query and path parameters into one request object.
///
/// Path parameters override query parameters, which only fill fields the
/// body did not set.
fn build_message(
    marshaler: &Marshaler,
    body: &[u8],
    query: Option<&str>,
    params: Vec<(String, String)>,
) -> Result<Value, Status> {
    let mut message: Map<String, Value> = if body.iter().all(u8::is_ascii_whitespace) {
        Map::new()
    } else {
        marshaler
            .decode(body)
            .map_err(|e| Status::invalid_argument(format!("invalid request body: {}", e)))?
    };

    if let Some(query) = query {
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            message
                .entry(key.into_owned())
                .or_insert_with(|| Value::String(value.into_owned()));
        }
    }

    for (key, value) in params {
        message.insert(key, Value::String(value));
    }

    Ok(Value::Object(message))
}
