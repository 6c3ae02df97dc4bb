use std::net::IpAddr;

use axum::http::HeaderMap;

/// Client-apparent source address for rate-limit keying.
///
/// Trusts a single forwarded hop: first entry of `X-Forwarded-For`,
/// then `X-Real-IP`, then the direct peer address. Deployments behind
/// an untrusted edge must strip those headers upstream.
pub fn client_ip(headers: &HeaderMap, direct: Option<IpAddr>) -> String {
    if let Some(value) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
        let first = value.split(',').next().unwrap_or("").trim();
        if let Ok(ip) = first.parse::<IpAddr>() {
            return ip.to_string();
        }
    }

    if let Some(value) = headers.get("x-real-ip").and_then(|v| v.to_str().ok()) {
        if let Ok(ip) = value.trim().parse::<IpAddr>() {
            return ip.to_string();
        }
    }

    match direct {
        Some(ip) => ip.to_string(),
        None => "unknown".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forwarded_chain_wins() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "203.0.113.7, 10.0.0.1".parse().unwrap());
        headers.insert("x-real-ip", "10.0.0.2".parse().unwrap());

        let peer = Some("127.0.0.1".parse().unwrap());
        assert_eq!(client_ip(&headers, peer), "203.0.113.7");
    }

    #[test]
    fn real_ip_beats_peer() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", "10.0.0.2".parse().unwrap());

        let peer = Some("127.0.0.1".parse().unwrap());
        assert_eq!(client_ip(&headers, peer), "10.0.0.2");
    }

    #[test]
    fn garbage_headers_fall_through() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "not-an-ip".parse().unwrap());

        let peer = Some("127.0.0.1".parse().unwrap());
        assert_eq!(client_ip(&headers, peer), "127.0.0.1");
        assert_eq!(client_ip(&headers, None), "unknown");
    }
}
