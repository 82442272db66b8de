//! What the transport can tell about a caller.

use std::net::{IpAddr, SocketAddr};

use axum::http::HeaderMap;
use ipnetwork::IpNetwork;

pub const FORWARDED_FOR: &str = "x-forwarded-for";
pub const LOCATION_CHANGED: &str = "x-location-changed";

/// Source address of the caller.
///
/// `X-Forwarded-For` is only read when the peer is a trusted proxy. Hops are
/// walked right to left and the first one outside `trusted` is the client;
/// an unparsable hop stops the walk at the last address that parsed.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>, trusted: &[IpNetwork]) -> Option<IpAddr> {
    let mut current = peer?.ip();
    if !is_trusted(current, trusted) {
        return Some(current);
    }

    let hops: Vec<&str> = headers
        .get_all(FORWARDED_FOR)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .collect();
    for hop in hops.into_iter().rev() {
        let Ok(ip) = hop.trim().parse::<IpAddr>() else {
            break;
        };
        current = ip;
        if !is_trusted(ip, trusted) {
            break;
        }
    }
    Some(current)
}

fn is_trusted(ip: IpAddr, trusted: &[IpNetwork]) -> bool {
    trusted.iter().any(|network| network.contains(ip))
}

/// Set by an upstream geo check when a login arrives from an unusual place.
pub fn location_changed(headers: &HeaderMap) -> bool {
    headers
        .get(LOCATION_CHANGED)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.trim().eq_ignore_ascii_case("true"))
}
