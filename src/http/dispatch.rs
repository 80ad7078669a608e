//! Request dispatch: CONNECT goes to the tunnel negotiator, everything else
//! is forwarded.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{header, Method, Request},
    response::Response,
};

use crate::http::forward::Forwarder;
use crate::tunnel::TunnelNegotiator;

/// Application state injected into the dispatcher.
#[derive(Clone)]
pub struct AppState {
    pub forwarder: Arc<Forwarder>,
    pub tunnels: Arc<TunnelNegotiator>,
}

/// Catch-all handler for every proxied request.
pub async fn dispatch(
    State(state): State<AppState>,
    ConnectInfo(remote): ConnectInfo<SocketAddr>,
    request: Request<Body>,
) -> Response {
    serve(&state, remote, request).await
}

/// Route one request by method.
pub async fn serve(state: &AppState, remote: SocketAddr, request: Request<Body>) -> Response {
    tracing::info!(
        method = %request.method(),
        target = %request_target(&request),
        client = %remote,
        "Received request"
    );

    if request.method() == Method::CONNECT {
        state.tunnels.negotiate(remote, request).await
    } else {
        state.forwarder.forward(remote, request).await
    }
}

/// The authority a request is aimed at: the URI authority when present
/// (absolute-form and CONNECT requests), otherwise the `Host` header.
pub fn request_target(request: &Request<Body>) -> String {
    if let Some(authority) = request.uri().authority() {
        return authority.to_string();
    }
    request
        .headers()
        .get(header::HOST)
        .and_then(|host| host.to_str().ok())
        .unwrap_or_default()
        .to_string()
}
