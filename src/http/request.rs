//! Request identity and call metadata.
//!
//! # Responsibilities
//! - Generate a request ID (UUID v4) when the client sent none
//! - Translate inbound HTTP headers into backend call metadata
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - Only an allow-listed set of headers crosses into outgoing metadata

use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Request};
use tower_http::request_id::{MakeRequestId, RequestId};
use uuid::Uuid;

pub const X_REQUEST_ID: &str = "x-request-id";
pub const X_LANG: &str = "x-lang";
pub const X_TIMEZONE: &str = "x-timezone";

/// Request ID generator for `SetRequestIdLayer`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MakeRequestUuid;

impl MakeRequestId for MakeRequestUuid {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&Uuid::new_v4().to_string())
            .ok()
            .map(RequestId::new)
    }
}

/// Build the outgoing call metadata for an inbound request.
///
/// Carries the credential, the request ID, the caller's language
/// (`Accept-Language` → `x-lang`) and timezone.
pub fn annotate(headers: &HeaderMap) -> HeaderMap {
    let mut metadata = HeaderMap::new();

    let forwarded = [
        (header::AUTHORIZATION, header::AUTHORIZATION),
        (HeaderName::from_static(X_REQUEST_ID), HeaderName::from_static(X_REQUEST_ID)),
        (header::ACCEPT_LANGUAGE, HeaderName::from_static(X_LANG)),
        (HeaderName::from_static(X_TIMEZONE), HeaderName::from_static(X_TIMEZONE)),
    ];

    for (from, to) in forwarded {
        if let Some(value) = headers.get(&from).filter(|v| !v.is_empty()) {
            metadata.insert(to, value.clone());
        }
    }
    metadata
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_annotate_maps_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer t"));
        headers.insert(header::ACCEPT_LANGUAGE, HeaderValue::from_static("id-ID"));
        headers.insert(X_TIMEZONE, HeaderValue::from_static("Asia/Jakarta"));
        headers.insert(X_REQUEST_ID, HeaderValue::from_static("req-9"));
        headers.insert(header::COOKIE, HeaderValue::from_static("session=1"));

        let metadata = annotate(&headers);
        assert_eq!(metadata[header::AUTHORIZATION], "Bearer t");
        assert_eq!(metadata[X_LANG], "id-ID");
        assert_eq!(metadata[X_TIMEZONE], "Asia/Jakarta");
        assert_eq!(metadata[X_REQUEST_ID], "req-9");
        assert!(metadata.get(header::COOKIE).is_none());
        assert_eq!(metadata.len(), 4);
    }

    #[test]
    fn test_empty_values_are_dropped() {
        let mut headers = HeaderMap::new();
        headers.insert(header::ACCEPT_LANGUAGE, HeaderValue::from_static(""));
        assert!(annotate(&headers).is_empty());
    }

    #[test]
    fn test_generated_ids_are_uuids() {
        let request = Request::new(());
        let id = MakeRequestUuid.make_request_id(&request).unwrap();
        let text = id.header_value().to_str().unwrap();
        assert!(Uuid::parse_str(text).is_ok());
    }
}
