//! Header manipulation for forwarded requests and responses.
//!
//! # Responsibilities
//! - Strip hop-by-hop headers (RFC 7230 §6.1), including any named in `Connection`
//! - Add X-Forwarded-For, X-Forwarded-Proto, X-Forwarded-Host
//! - Leave end-to-end headers (notably `Authorization`) untouched

use std::net::SocketAddr;

use axum::http::{header, HeaderMap, HeaderName, HeaderValue};

pub const X_FORWARDED_FOR: &str = "x-forwarded-for";
pub const X_FORWARDED_PROTO: &str = "x-forwarded-proto";
pub const X_FORWARDED_HOST: &str = "x-forwarded-host";

const HOP_BY_HOP: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Remove hop-by-hop headers in place.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let named: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for name in named {
        headers.remove(name);
    }
    for name in HOP_BY_HOP {
        headers.remove(name);
    }
}

/// Headers to send upstream for an inbound request.
///
/// `Host` and `Content-Length` are dropped; the client recomputes both for
/// the outbound request.
pub fn forward_request_headers(inbound: &HeaderMap, client_addr: Option<SocketAddr>) -> HeaderMap {
    let mut headers = inbound.clone();
    strip_hop_by_hop(&mut headers);
    headers.remove(header::HOST);
    headers.remove(header::CONTENT_LENGTH);

    if let Some(addr) = client_addr {
        let ip = addr.ip().to_string();
        let forwarded_for = match inbound.get(X_FORWARDED_FOR).and_then(|v| v.to_str().ok()) {
            Some(existing) => format!("{}, {}", existing, ip),
            None => ip,
        };
        if let Ok(value) = HeaderValue::from_str(&forwarded_for) {
            headers.insert(X_FORWARDED_FOR, value);
        }
    }

    if !headers.contains_key(X_FORWARDED_PROTO) {
        headers.insert(X_FORWARDED_PROTO, HeaderValue::from_static("http"));
    }
    if let Some(host) = inbound.get(header::HOST) {
        if !headers.contains_key(X_FORWARDED_HOST) {
            headers.insert(X_FORWARDED_HOST, host.clone());
        }
    }

    headers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_connection_named_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive, x-session-hint"));
        headers.insert("x-session-hint", HeaderValue::from_static("1"));
        headers.insert(header::TRANSFER_ENCODING, HeaderValue::from_static("chunked"));
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));

        strip_hop_by_hop(&mut headers);
        assert!(headers.get("x-session-hint").is_none());
        assert!(headers.get(header::CONNECTION).is_none());
        assert!(headers.get(header::TRANSFER_ENCODING).is_none());
        assert!(headers.get(header::CONTENT_TYPE).is_some());
    }

    #[test]
    fn forwarded_headers_keep_authorization() {
        let mut inbound = HeaderMap::new();
        inbound.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer X"));
        inbound.insert(header::HOST, HeaderValue::from_static("shop.local"));
        inbound.insert(header::CONTENT_LENGTH, HeaderValue::from_static("17"));
        inbound.insert(X_FORWARDED_FOR, HeaderValue::from_static("10.0.0.1"));

        let out = forward_request_headers(&inbound, Some("192.168.1.5:51000".parse().unwrap()));
        assert_eq!(out.get(header::AUTHORIZATION).unwrap(), "Bearer X");
        assert!(out.get(header::HOST).is_none());
        assert!(out.get(header::CONTENT_LENGTH).is_none());
        assert_eq!(out.get(X_FORWARDED_FOR).unwrap(), "10.0.0.1, 192.168.1.5");
        assert_eq!(out.get(X_FORWARDED_HOST).unwrap(), "shop.local");
        assert_eq!(out.get(X_FORWARDED_PROTO).unwrap(), "http");
    }
}
