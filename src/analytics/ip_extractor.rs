//! Client IP extraction from HTTP headers with trust validation
//!
//! This module implements client IP extraction that:
//! - Walks X-Forwarded-For and Forwarded chains right-to-left, skipping trusted hops
//! - Supports vendor-specific headers (e.g., CF-Connecting-IP)
//! - Falls back to the socket remote address when headers are untrusted
//! - Handles both IPv4 and IPv6

use axum::http::HeaderMap;
use std::net::IpAddr;
use tracing::warn;

use crate::config::{ClientIpConfig, TrustedProxyMode};

/// Extract the client IP address for an inbound request
///
/// # Arguments
/// * `headers` - HTTP request headers
/// * `socket_addr` - The socket remote address, when the transport exposes it
/// * `config` - Trust settings
///
/// # Returns
/// The client address, anonymized when configured, or `None` if nothing usable was found
pub fn extract_client_ip(
    headers: &HeaderMap,
    socket_addr: Option<IpAddr>,
    config: &ClientIpConfig,
) -> Option<IpAddr> {
    let ip = match config.trusted_proxy_mode {
        TrustedProxyMode::Cloudflare => extract_cloudflare_ip(headers).or_else(|| {
            warn!("CF-Connecting-IP header missing in Cloudflare mode, using socket address");
            socket_addr
        }),
        TrustedProxyMode::Standard => extract_standard_ip(headers, config).or(socket_addr),
        TrustedProxyMode::None => socket_addr,
    }?;

    if config.ip_anonymization {
        Some(anonymize_ip(ip))
    } else {
        Some(ip)
    }
}

/// Extract IP from Cloudflare-specific header
fn extract_cloudflare_ip(headers: &HeaderMap) -> Option<IpAddr> {
    headers
        .get("cf-connecting-ip")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.trim().parse::<IpAddr>().ok())
}

/// Extract IP from standard headers (Forwarded, X-Forwarded-For) with trust validation
fn extract_standard_ip(headers: &HeaderMap, config: &ClientIpConfig) -> Option<IpAddr> {
    // Prefer RFC 7239 Forwarded header
    let forwarded = parse_forwarded(headers);
    if !forwarded.is_empty() {
        return select_from_chain(&forwarded, config);
    }

    let xff = parse_x_forwarded_for(headers);
    if !xff.is_empty() {
        return select_from_chain(&xff, config);
    }

    None
}

/// Collect the `for=` addresses of a Forwarded header, in hop order
fn parse_forwarded(headers: &HeaderMap) -> Vec<IpAddr> {
    let Some(forwarded) = headers.get("forwarded").and_then(|h| h.to_str().ok()) else {
        return Vec::new();
    };

    // Forwarded: for=192.0.2.60;proto=http;by=203.0.113.43, for="[2001:db8::1]:4711"
    forwarded
        .split(',')
        .flat_map(|element| element.split(';'))
        .filter_map(|param| {
            let param = param.trim();
            let (key, value) = param.split_once('=')?;
            if !key.trim().eq_ignore_ascii_case("for") {
                return None;
            }
            parse_forwarded_node(value.trim())
        })
        .collect()
}

fn parse_forwarded_node(value: &str) -> Option<IpAddr> {
    let value = value.trim_matches('"');

    if let Some(rest) = value.strip_prefix('[') {
        // Bracketed IPv6, optionally followed by a port
        return rest.split(']').next()?.parse().ok();
    }

    if let Ok(ip) = value.parse::<IpAddr>() {
        return Some(ip);
    }

    // IPv4 with port
    value.split(':').next()?.parse().ok()
}

fn parse_x_forwarded_for(headers: &HeaderMap) -> Vec<IpAddr> {
    headers
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .map(|xff| {
            xff.split(',')
                .filter_map(|s| s.trim().parse::<IpAddr>().ok())
                .collect()
        })
        .unwrap_or_default()
}

/// Pick the client from a proxy chain using right-to-left trust validation
fn select_from_chain(ips: &[IpAddr], config: &ClientIpConfig) -> Option<IpAddr> {
    // If num_trusted_proxies is specified, skip that many from the right
    if let Some(num_trusted) = config.num_trusted_proxies {
        if ips.len() > num_trusted {
            return Some(ips[ips.len() - num_trusted - 1]);
        }
        // Not enough IPs in chain, return the leftmost (least trusted)
        return ips.first().copied();
    }

    // With a CIDR list, the client is the first address from the right that is not a trusted proxy
    if !config.trusted_proxies.is_empty() {
        return ips
            .iter()
            .rev()
            .find(|ip| !config.trusted_proxies.iter().any(|net| net.contains(*ip)))
            .or_else(|| ips.first())
            .copied();
    }

    // No trust configuration, return the rightmost IP
    ips.last().copied()
}

/// Anonymize an IP address by truncating to network prefix
///
/// - IPv4: Truncate to /24 (zero last octet)
/// - IPv6: Truncate to /48 (zero last 80 bits)
pub fn anonymize_ip(ip: IpAddr) -> IpAddr {
    match ip {
        IpAddr::V4(addr) => {
            let octets = addr.octets();
            IpAddr::V4(std::net::Ipv4Addr::new(octets[0], octets[1], octets[2], 0))
        }
        IpAddr::V6(addr) => {
            let segments = addr.segments();
            IpAddr::V6(std::net::Ipv6Addr::new(
                segments[0],
                segments[1],
                segments[2],
                0,
                0,
                0,
                0,
                0,
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn create_config(mode: TrustedProxyMode) -> ClientIpConfig {
        ClientIpConfig {
            trusted_proxy_mode: mode,
            ..ClientIpConfig::default()
        }
    }

    fn socket() -> Option<IpAddr> {
        Some("192.168.1.1".parse().unwrap())
    }

    #[test]
    fn test_extract_client_ip_none_mode() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.1"));
        let config = create_config(TrustedProxyMode::None);

        assert_eq!(extract_client_ip(&headers, socket(), &config), socket());
        assert_eq!(extract_client_ip(&headers, None, &config), None);
    }

    #[test]
    fn test_extract_cloudflare_ip() {
        let mut headers = HeaderMap::new();
        headers.insert("cf-connecting-ip", HeaderValue::from_static("203.0.113.1"));
        let config = create_config(TrustedProxyMode::Cloudflare);

        let result = extract_client_ip(&headers, socket(), &config);
        assert_eq!(result, Some("203.0.113.1".parse().unwrap()));

        let fallback = extract_client_ip(&HeaderMap::new(), socket(), &config);
        assert_eq!(fallback, socket());
    }

    #[test]
    fn test_extract_x_forwarded_for_basic() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.1, 198.51.100.1"),
        );
        let config = create_config(TrustedProxyMode::Standard);

        let result = extract_client_ip(&headers, socket(), &config);
        // Should return rightmost IP in the absence of trust configuration
        assert_eq!(result, Some("198.51.100.1".parse().unwrap()));
    }

    #[test]
    fn test_extract_x_forwarded_for_skips_trusted_hops() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.1, 198.51.100.1, 10.0.0.7"),
        );

        let mut config = create_config(TrustedProxyMode::Standard);
        config.num_trusted_proxies = Some(2);
        assert_eq!(
            extract_client_ip(&headers, socket(), &config),
            Some("203.0.113.1".parse().unwrap())
        );

        let mut config = create_config(TrustedProxyMode::Standard);
        config.trusted_proxies = vec!["10.0.0.0/8".parse().unwrap()];
        assert_eq!(
            extract_client_ip(&headers, socket(), &config),
            Some("198.51.100.1".parse().unwrap())
        );
    }

    #[test]
    fn test_extract_forwarded_header() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "forwarded",
            HeaderValue::from_static(
                r#"for="[2001:db8::1]:4711";proto=https, for=192.0.2.60:8080"#,
            ),
        );
        let mut config = create_config(TrustedProxyMode::Standard);
        config.num_trusted_proxies = Some(1);

        let result = extract_client_ip(&headers, socket(), &config);
        assert_eq!(result, Some("2001:db8::1".parse().unwrap()));
    }

    #[test]
    fn test_standard_mode_falls_back_to_socket() {
        let config = create_config(TrustedProxyMode::Standard);
        assert_eq!(extract_client_ip(&HeaderMap::new(), socket(), &config), socket());
    }

    #[test]
    fn test_anonymization_applied() {
        let mut config = create_config(TrustedProxyMode::None);
        config.ip_anonymization = true;

        let peer = Some("192.168.1.100".parse().unwrap());
        let result = extract_client_ip(&HeaderMap::new(), peer, &config);
        assert_eq!(result, Some("192.168.1.0".parse().unwrap()));
    }

    #[test]
    fn test_anonymize_ipv6() {
        let ip: IpAddr = "2001:db8::1234:5678".parse().unwrap();
        let anonymized = anonymize_ip(ip);
        // Should zero out everything after first 48 bits (3 segments)
        assert_eq!(anonymized, "2001:db8::".parse::<IpAddr>().unwrap());
    }
}
