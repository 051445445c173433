//! Per-tier rate limiting backed by the shared ephemeral store.
//!
//! Counters are keyed by the matched route pattern and the client: the user
//! id once [`require_auth`](crate::auth::middleware::require_auth) has run,
//! the source address otherwise.

use std::net::{IpAddr, SocketAddr};

use axum::extract::{ConnectInfo, MatchedPath, Request, State};
use axum::middleware::Next;
use axum::response::Response;
use kblog_core::{ClientIdentity, RateTier};

use crate::auth::middleware::AuthUser;
use crate::error::AppError;
use crate::state::AppState;

/// Client IP: the first `X-Forwarded-For` entry when `trust_forwarded` is
/// set and the header parses, otherwise the peer address.
fn extract_ip(request: &Request, trust_forwarded: bool) -> Option<IpAddr> {
    if trust_forwarded {
        let forwarded = request
            .headers()
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .and_then(|first| first.trim().parse::<IpAddr>().ok());
        if forwarded.is_some() {
            return forwarded;
        }
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.ip())
}

fn route_of(request: &Request) -> String {
    request
        .extensions()
        .get::<MatchedPath>()
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string())
}

async fn enforce(
    state: &AppState,
    tier: RateTier,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let user_id = request
        .extensions()
        .get::<AuthUser>()
        .map(|u| u.claims.user_id);
    let client = ClientIdentity::resolve(
        user_id,
        extract_ip(&request, state.config.trust_forwarded_for),
    );
    let route = route_of(&request);

    state.rate_limiter.check(tier, &route, &client).await?;
    Ok(next.run(request).await)
}

pub async fn public_tier(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    enforce(&state, RateTier::Public, request, next).await
}

pub async fn private_tier(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    enforce(&state, RateTier::Private, request, next).await
}

/// Login, registration and refresh.
pub async fn auth_tier(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    enforce(&state, RateTier::Auth, request, next).await
}

#[cfg(test)]
mod tests {
    use axum::body::Body;

    use super::*;

    #[test]
    fn forwarded_header_wins_over_peer() {
        let mut req = axum::http::Request::builder()
            .header("x-forwarded-for", "203.0.113.7, 10.0.0.1")
            .body(Body::empty())
            .unwrap();
        req.extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 5000))));
        assert_eq!(extract_ip(&req, true), Some("203.0.113.7".parse().unwrap()));
    }

    #[test]
    fn forwarded_header_ignored_unless_trusted() {
        let mut req = axum::http::Request::builder()
            .header("x-forwarded-for", "203.0.113.7")
            .body(Body::empty())
            .unwrap();
        assert_eq!(extract_ip(&req, false), None);

        req.extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 5000))));
        assert_eq!(extract_ip(&req, false), Some("127.0.0.1".parse().unwrap()));
    }

    #[test]
    fn peer_address_fallback() {
        let mut req = axum::http::Request::builder()
            .header("x-forwarded-for", "not-an-ip")
            .body(Body::empty())
            .unwrap();
        assert_eq!(extract_ip(&req, true), None);

        req.extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([192, 168, 0, 2], 5000))));
        assert_eq!(extract_ip(&req, true), Some("192.168.0.2".parse().unwrap()));
    }
}
