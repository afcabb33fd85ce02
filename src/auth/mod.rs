//! Authentication subsystem.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     service descriptors → endpoints.rs (scan once) → EndpointRegistry
//!
//! Per backend call:
//!     OutboundCall
//!     → interceptor.rs (exempt? else extract "Bearer <token>")
//!     → jwt.rs (verify signature, expiry, principal)
//!     → principal appended to outgoing metadata
//!     → inner Invoker
//! ```

pub mod endpoints;
pub mod interceptor;
pub mod jwt;

pub use endpoints::{
    endpoint_id, DescriptorSource, EndpointClassifier, EndpointRegistry, StaticDescriptors,
    PUBLIC_ENDPOINT_OPTION,
};
pub use interceptor::{AuthInterceptor, InterceptedInvoker};
pub use jwt::{CredentialValidator, IdentityClaim, TokenError};
