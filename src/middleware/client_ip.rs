use std::net::{IpAddr, SocketAddr};

use axum::extract::connect_info::ConnectInfo;
use axum::http::{Extensions, HeaderMap};

use crate::config::ForwardedFor;

const UNKNOWN_CLIENT: &str = "unknown";

/// Resolves the caller's address.
///
/// With [`ForwardedFor::FirstEntry`] the order is first `X-Forwarded-For`
/// entry, then `X-Real-IP`, then the socket address. With
/// [`ForwardedFor::TrustedProxies`] only the entry added by the outermost
/// trusted proxy is used, then the socket address.
pub fn resolve_client_ip(
    headers: &HeaderMap,
    extensions: &Extensions,
    forwarded_for: ForwardedFor,
) -> String {
    let from_headers = match forwarded_for {
        ForwardedFor::FirstEntry => first_forwarded_entry(headers).or_else(|| real_ip(headers)),
        ForwardedFor::TrustedProxies(depth) => trusted_forwarded_entry(headers, depth),
    };
    if let Some(ip) = from_headers {
        return ip;
    }

    extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|connect_info| connect_info.0.ip().to_string())
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}

fn first_forwarded_entry(headers: &HeaderMap) -> Option<String> {
    header_value(headers, "x-forwarded-for")
        .and_then(|raw| raw.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .map(str::to_string)
}

fn real_ip(headers: &HeaderMap) -> Option<String> {
    header_value(headers, "x-real-ip")
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .map(str::to_string)
}

fn trusted_forwarded_entry(headers: &HeaderMap, depth: usize) -> Option<String> {
    let raw = header_value(headers, "x-forwarded-for")?;
    let chain: Vec<IpAddr> = raw.split(',').map(str::trim).filter_map(parse_entry).collect();

    if depth >= chain.len() {
        return None;
    }

    chain.get(chain.len() - 1 - depth).map(IpAddr::to_string)
}

fn parse_entry(value: &str) -> Option<IpAddr> {
    value
        .parse::<IpAddr>()
        .ok()
        .or_else(|| value.parse::<SocketAddr>().ok().map(|addr| addr.ip()))
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}
