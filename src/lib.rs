//! Admission gateway library.
//!
//! HTTP front door for internal RPC services: rate limiting, bearer token
//! authentication and a uniform `{status, message, data}` response envelope.

pub mod auth;
pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod routing;
pub mod rpc;
pub mod security;

pub use config::GatewayConfig;
pub use error::GatewayError;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
