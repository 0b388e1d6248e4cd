//! Per-client rate limiting middleware

use axum::{
    extract::{ConnectInfo, Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use crate::{ApiError, AppState};

/// Bucket for requests whose origin cannot be determined
const UNKNOWN_CLIENT: IpAddr = IpAddr::V4(Ipv4Addr::UNSPECIFIED);

/// Client address, proxy headers first
///
/// Order: first `x-forwarded-for` entry, `x-real-ip`, `cf-connecting-ip`,
/// then the socket peer.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> IpAddr {
    let from_header = |name: &str, first_only: bool| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(|v| if first_only { v.split(',').next().unwrap_or("") } else { v })
            .and_then(|v| v.trim().parse::<IpAddr>().ok())
    };

    from_header("x-forwarded-for", true)
        .or_else(|| from_header("x-real-ip", false))
        .or_else(|| from_header("cf-connecting-ip", false))
        .or_else(|| peer.map(|addr| addr.ip()))
        .unwrap_or(UNKNOWN_CLIENT)
}

pub async fn rate_limit(State(state): State<AppState>, request: Request, next: Next) -> Result<Response, ApiError> {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let ip = client_ip(request.headers(), peer);

    state
        .rate_limiter
        .check(ip)
        .map_err(|retry_after_secs| ApiError::RateLimited { retry_after_secs })?;

    Ok(next.run(request).await)
}
