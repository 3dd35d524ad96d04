//! Request metadata extraction for interaction tracking

use axum::{
    extract::{ConnectInfo, FromRequestParts},
    http::{
        header::{HeaderName, REFERER, USER_AGENT},
        request::Parts,
        HeaderMap,
    },
};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use super::handlers::AppState;
use crate::analytics::{extract_client_ip, RequestContext};

/// Network address, user-agent and referrer of the calling client
///
/// Every field is best effort; extraction never rejects a request.
#[derive(Debug, Clone)]
pub struct ClientContext(pub RequestContext);

fn header_string(headers: &HeaderMap, name: HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

impl FromRequestParts<Arc<AppState>> for ClientContext {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let socket_ip = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());

        let ip = extract_client_ip(&parts.headers, socket_ip, &state.client_ip);

        Ok(Self(RequestContext {
            ip: ip.map(|ip| ip.to_string()),
            user_agent: header_string(&parts.headers, USER_AGENT),
            referrer: header_string(&parts.headers, REFERER),
        }))
    }
}
