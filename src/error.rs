//! Request-path error taxonomy.
//!
//! Every failure a client can observe is a [`GatewayError`]. Each variant maps
//! to an RPC [`Code`], and from there to an HTTP status, through the single
//! table in [`crate::rpc`]. Rendering goes through the envelope marshaler so
//! failures have the same shape as successes.

use axum::response::{IntoResponse, Response};

use crate::auth::jwt::TokenError;
use crate::http::envelope::{Marshaler, Outcome};
use crate::rpc::{Code, Status};
use crate::security::{LimitDecision, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("missing authorization")]
    MissingCredential,
    #[error("invalid authorization header format")]
    MalformedCredential,
    #[error("invalid token")]
    InvalidToken,
    #[error("token has expired")]
    ExpiredToken,
    #[error("too many requests")]
    RateLimited(LimitDecision),
    #[error("dependency unavailable: {0}")]
    DependencyUnavailable(#[from] StoreError),
    #[error("{}", .0.message)]
    Backend(Status),
}

impl GatewayError {
    pub fn code(&self) -> Code {
        match self {
            GatewayError::MissingCredential
            | GatewayError::MalformedCredential
            | GatewayError::InvalidToken
            | GatewayError::ExpiredToken => Code::Unauthenticated,
            GatewayError::RateLimited(_) => Code::ResourceExhausted,
            GatewayError::DependencyUnavailable(_) => Code::Unavailable,
            GatewayError::Backend(status) => status.code,
        }
    }

    /// The status carried to the client.
    pub fn status(&self) -> Status {
        match self {
            GatewayError::Backend(status) => status.clone(),
            other => Status::new(other.code(), other.to_string()),
        }
    }
}

impl From<TokenError> for GatewayError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Invalid => GatewayError::InvalidToken,
            TokenError::Expired => GatewayError::ExpiredToken,
        }
    }
}

impl From<Status> for GatewayError {
    fn from(status: Status) -> Self {
        GatewayError::Backend(status)
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let mut response = Marshaler.respond(Outcome::Failure(self.status()));
        if let GatewayError::RateLimited(decision) = &self {
            decision.apply_headers(response.headers_mut());
        }
        response
    }
}
