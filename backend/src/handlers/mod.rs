//! HTTP handlers. Each one extracts, calls a service, and serializes.

use std::{convert::Infallible, net::SocketAddr};

use axum::{
    extract::{ConnectInfo, FromRequestParts},
    http::{header::USER_AGENT, request::Parts, HeaderMap},
};

use crate::services::{email_tracking::resolve_client_ip, password_reset::RequestOrigin};

pub mod auth;
pub mod clients;
pub mod invoices;
pub mod numbering;
pub mod scheduler;
pub mod sellers;
pub mod timesheets;
pub mod tracking;
pub mod users;
pub mod views;

/// Socket peer when the server was started with connect info; `None` in
/// tests driven through `oneshot`.
#[derive(Debug, Clone, Copy)]
pub struct ClientAddr(pub Option<SocketAddr>);

impl<S> FromRequestParts<S> for ClientAddr
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(ClientAddr(
            parts
                .extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| *addr),
        ))
    }
}

pub fn user_agent(headers: &HeaderMap) -> Option<String> {
    headers
        .get(USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

pub fn request_origin(headers: &HeaderMap, peer: Option<SocketAddr>) -> RequestOrigin {
    RequestOrigin {
        ip: resolve_client_ip(headers, peer),
        user_agent: user_agent(headers),
    }
}
