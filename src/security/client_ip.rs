//! Client address resolution for anonymous rate-limit keys.

use axum::http::HeaderMap;

const X_FORWARDED_FOR: &str = "x-forwarded-for";
const X_REAL_IP: &str = "x-real-ip";

/// Resolve the client address: first `X-Forwarded-For` hop, then `X-Real-IP`,
/// then the transport peer with its port stripped.
pub fn client_address(headers: &HeaderMap, peer: Option<&str>) -> String {
    if let Some(first) = header_str(headers, X_FORWARDED_FOR)
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
    {
        return first.to_string();
    }

    if let Some(real) = header_str(headers, X_REAL_IP)
        .map(str::trim)
        .filter(|v| !v.is_empty())
    {
        return real.to_string();
    }

    match peer {
        Some(peer) => strip_port(peer).to_string(),
        None => "unknown".to_string(),
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Cut at the last `:`. The peer always comes from a socket address, so the
/// last colon separates the port ("[::1]:443" keeps its brackets).
fn strip_port(peer: &str) -> &str {
    peer.rfind(':').map_or(peer, |idx| &peer[..idx])
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn test_forwarded_for_first_hop_wins() {
        let h = headers(&[
            ("x-forwarded-for", " 203.0.113.7 , 10.0.0.1"),
            ("x-real-ip", "198.51.100.1"),
        ]);
        assert_eq!(client_address(&h, Some("127.0.0.1:5000")), "203.0.113.7");
    }

    #[test]
    fn test_real_ip_fallback() {
        let h = headers(&[("x-real-ip", " 198.51.100.1 ")]);
        assert_eq!(client_address(&h, Some("127.0.0.1:5000")), "198.51.100.1");
    }

    #[test]
    fn test_peer_without_port() {
        let h = HeaderMap::new();
        assert_eq!(client_address(&h, Some("192.0.2.4:51234")), "192.0.2.4");
        assert_eq!(client_address(&h, Some("[::1]:8080")), "[::1]");
        assert_eq!(client_address(&h, Some("192.0.2.4")), "192.0.2.4");
        assert_eq!(client_address(&h, None), "unknown");
    }

    #[test]
    fn test_peer_split_at_last_colon() {
        let h = HeaderMap::new();
        assert_eq!(client_address(&h, Some("[2001:db8::7]:443")), "[2001:db8::7]");
        // Bare IPv6 text is still cut at its last colon.
        assert_eq!(client_address(&h, Some("2001:db8::7")), "2001:db8:");
    }
}
