//! Request extractors for bearer auth and client identity.

use crate::error::ApiError;
use crate::state::AppState;
use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use log::debug;
use std::net::SocketAddr;

const X_FORWARDED_FOR: &str = "x-forwarded-for";
const UNKNOWN_CLIENT: &str = "unknown";

/// Raw bearer token; rejects with 401 when the header is absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BearerToken(pub String);

/// Verified caller of a protected route.
///
/// Missing credentials reject with 401; invalid, expired or revoked
/// tokens reject with 403.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub user_id: String,
    pub email: String,
}

/// Rate-limit key for the calling client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientKey(pub String);

pub fn bearer_from_parts(parts: &Parts) -> Option<String> {
    parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
}

impl<S: Send + Sync> FromRequestParts<S> for BearerToken {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        bearer_from_parts(parts)
            .map(BearerToken)
            .ok_or_else(|| ApiError::unauthorized("Access token required"))
    }
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_from_parts(parts)
            .ok_or_else(|| ApiError::unauthorized("Access token required"))?;
        authorize(state, &token)
    }
}

/// Verifies `token` against the signing key and the revocation list.
pub fn authorize(state: &AppState, token: &str) -> Result<AuthUser, ApiError> {
    if state.security.blacklist.is_revoked(token) {
        return Err(ApiError::forbidden("Invalid or expired token"));
    }
    match state.security.tokens.verify(token, state.now_ms()) {
        Ok(claims) => Ok(AuthUser {
            user_id: claims.user_id,
            email: claims.email,
        }),
        Err(err) => {
            debug!("event=auth_token module=server status=rejected error={err}");
            Err(ApiError::forbidden("Invalid or expired token"))
        }
    }
}

impl FromRequestParts<AppState> for ClientKey {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        Ok(ClientKey(client_key(&parts.headers, peer, state.trusted_proxy_hops)))
    }
}

/// Resolves the rate-limit key for a request.
///
/// With zero trusted hops the socket peer is the client and
/// `x-forwarded-for` is ignored. With `n` trusted hops the key is the
/// `n`-th address from the right of `x-forwarded-for`, since each trusted
/// proxy appends the address it received the request from.
pub fn client_key(headers: &HeaderMap, peer: Option<SocketAddr>, trusted_hops: usize) -> String {
    let peer_ip = peer.map(|addr| addr.ip().to_string());
    if trusted_hops == 0 {
        return peer_ip.unwrap_or_else(|| UNKNOWN_CLIENT.to_string());
    }

    let hops: Vec<&str> = headers
        .get_all(X_FORWARDED_FOR)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .map(str::trim)
        .filter(|hop| !hop.is_empty())
        .collect();
    let forwarded = match hops.len() {
        0 => None,
        len if len >= trusted_hops => Some(hops[len - trusted_hops]),
        _ => hops.first().copied(),
    };
    forwarded
        .map(str::to_string)
        .or(peer_ip)
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}
