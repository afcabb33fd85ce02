//! Response envelope marshaling.
//!
//! # Responsibilities
//! - Wrap every response body as `{status, message, data}`
//! - Map failure codes to HTTP statuses through the standard RPC table
//! - Decode request bodies (plain JSON, no envelope on the way in)
//!
//! # Design Decisions
//! - Success and failure share one struct, so both always carry the same
//!   three keys
//! - The HTTP response status equals the envelope `status`

use axum::body::Body;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::rpc::Status;

pub const CONTENT_TYPE_JSON: &str = "application/json";

/// The wire wrapper around every response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub status: u16,
    pub message: String,
    pub data: Option<Value>,
}

/// What a backend call produced.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Success(Value),
    Failure(Status),
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Marshaler;

impl Marshaler {
    pub fn envelope(&self, outcome: Outcome) -> Envelope {
        match outcome {
            Outcome::Success(payload) => Envelope {
                status: StatusCode::OK.as_u16(),
                message: "success".to_string(),
                data: Some(match payload {
                    Value::Null => Value::Object(Default::default()),
                    other => other,
                }),
            },
            Outcome::Failure(status) => Envelope {
                status: status.http_status().as_u16(),
                message: status.message,
                data: None,
            },
        }
    }

    /// Serialize an outcome into envelope bytes.
    pub fn wrap(&self, outcome: Outcome) -> Vec<u8> {
        let envelope = self.envelope(outcome);
        // An Envelope holds only strings, integers and JSON values.
        serde_json::to_vec(&envelope).unwrap_or_else(|_| {
            br#"{"status":500,"message":"internal error","data":null}"#.to_vec()
        })
    }

    /// Wrap any serializable success payload.
    pub fn marshal<T: Serialize>(&self, payload: &T) -> Result<Vec<u8>, serde_json::Error> {
        let value = serde_json::to_value(payload)?;
        Ok(self.wrap(Outcome::Success(value)))
    }

    /// Decode a request body. Unknown fields are ignored.
    pub fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    pub fn content_type(&self) -> &'static str {
        CONTENT_TYPE_JSON
    }

    /// Build the HTTP response for an outcome.
    pub fn respond(&self, outcome: Outcome) -> Response {
        let status = match &outcome {
            Outcome::Success(_) => StatusCode::OK,
            Outcome::Failure(failure) => failure.http_status(),
        };

        let mut response = Response::new(Body::from(self.wrap(outcome)));
        *response.status_mut() = status;
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static(self.content_type()),
        );
        response
    }
}

impl IntoResponse for Outcome {
    fn into_response(self) -> Response {
        Marshaler.respond(self)
    }
}
