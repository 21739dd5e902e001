use std::net::SocketAddr;

use axum::http::HeaderMap;

/// Resolves the address the throttle keys on.
///
/// `X-Forwarded-For` is only honoured behind a trusted reverse proxy;
/// otherwise any client could pick its own key.
pub fn client_ip(headers: &HeaderMap, addr: SocketAddr, trust_proxy: bool) -> String {
    if trust_proxy {
        let forwarded = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|xff| xff.split(',').next().map(|s| s.trim().to_string()))
            .filter(|s| !s.is_empty());
        if let Some(ip) = forwarded {
            return ip;
        }
    }
    addr.ip().to_string()
}
