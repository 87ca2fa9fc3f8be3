//! Client address resolution behind reverse proxies.
//!
//! The address chain is the TCP peer followed by the `X-Forwarded-For`
//! entries read right to left. Each trusted hop lets us step one entry
//! further down that chain; entries written by the client itself are never
//! reached unless the operator trusts more hops than actually exist.

use std::net::IpAddr;

use axum::http::HeaderMap;

pub const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Resolve the client address given `trusted_hops` proxies in front of us.
pub fn resolve_client_ip(peer: IpAddr, headers: &HeaderMap, trusted_hops: usize) -> IpAddr {
    if trusted_hops == 0 {
        return peer;
    }

    let forwarded: Vec<&str> = headers
        .get_all(X_FORWARDED_FOR)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .collect();

    let mut client = peer;
    for (hop, entry) in forwarded.iter().rev().enumerate() {
        if hop >= trusted_hops {
            break;
        }
        match parse_forwarded_ip(entry) {
            Some(ip) => client = ip,
            None => break,
        }
    }
    client
}

/// Accepts bare addresses, `ip:port` and bracketed IPv6 with a port.
fn parse_forwarded_ip(entry: &str) -> Option<IpAddr> {
    if let Ok(ip) = entry.parse() {
        return Some(ip);
    }
    if let Ok(sock) = entry.parse::<std::net::SocketAddr>() {
        return Some(sock.ip());
    }
    entry
        .strip_prefix('[')
        .and_then(|rest| rest.split(']').next())
        .and_then(|inner| inner.parse().ok())
}
