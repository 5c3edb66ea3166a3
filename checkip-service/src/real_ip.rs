//! Client address resolution for requests that may have crossed proxies.

use axum::{
    extract::{ConnectInfo, FromRequestParts},
    http::{Extensions, HeaderMap, request::Parts},
};
use std::convert::Infallible;
use std::net::{IpAddr, SocketAddr};

use crate::listener::ClientAddr;

pub const X_REAL_IP: &str = "x-real-ip";
pub const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// The caller's IP address as seen through `X-Forwarded-For` / `X-Real-Ip`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIp(pub String);

impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(ClientIp(client_ip(
            &parts.headers,
            peer_addr(&parts.extensions),
        )))
    }
}

/// Peer address of the underlying connection, when served over TCP.
pub fn peer_addr(extensions: &Extensions) -> Option<SocketAddr> {
    extensions
        .get::<ConnectInfo<ClientAddr>>()
        .map(|ConnectInfo(ClientAddr(addr))| *addr)
}

/// Pick the client IP from proxy headers, falling back to the peer address.
///
/// Without either header the peer IP is used. Otherwise the first public
/// address in `X-Forwarded-For` wins, and `X-Real-Ip` is the last resort.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    let real_ip = header_value(headers, X_REAL_IP);
    let forwarded_for = header_value(headers, X_FORWARDED_FOR);

    if real_ip.is_empty() && forwarded_for.is_empty() {
        return peer.map(|addr| addr.ip().to_string()).unwrap_or_default();
    }

    forwarded_for
        .split(',')
        .map(str::trim)
        .find(|candidate| {
            candidate
                .parse::<IpAddr>()
                .is_ok_and(|ip| !is_private(&ip))
        })
        .unwrap_or(real_ip)
        .to_string()
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> &'a str {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .unwrap_or_default()
}

fn is_private(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_private()
                || v4.is_loopback()
                || v4.is_link_local()
                || v4.is_unspecified()
                || v4.is_broadcast()
        }
        IpAddr::V6(v6) => {
            if let Some(mapped) = v6.to_ipv4_mapped() {
                return is_private(&IpAddr::V4(mapped));
            }
            let first = v6.segments()[0];
            v6.is_loopback()
                || v6.is_unspecified()
                // fc00::/7 unique local
                || (first & 0xfe00) == 0xfc00
                // fe80::/10 link local
                || (first & 0xffc0) == 0xfe80
        }
    }
}
