//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → /healthz, /openapi/, /swagger-ui (docs.rs, outside the limiter)
//!     → server.rs (axum setup, middleware stack)
//!     → request.rs (request ID, call metadata)
//!     → [rate limiter]
//!     → [route table picks the endpoint]
//!     → [auth interceptor + backend invoker]
//!     → envelope.rs (wrap success or failure)
//!     → Send to client
//! ```

pub mod docs;
pub mod envelope;
pub mod request;
pub mod server;

pub use envelope::{Envelope, Marshaler, Outcome};
pub use request::{MakeRequestUuid, X_REQUEST_ID};
pub use server::HttpServer;
