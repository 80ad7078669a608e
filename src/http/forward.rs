//! Plain HTTP forwarding.
//!
//! # Data Flow
//! ```text
//! inbound request
//!     → X-Forwarded-For += client IP
//!     → RoundTrip transport (origin)
//!     → copy origin headers, status, streamed body
//!     → client response
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
};

use crate::http::headers::{append_forwarded_for, copy_headers};
use crate::http::transport::RoundTrip;

/// Forwards non-CONNECT requests to their origin.
#[derive(Clone)]
pub struct Forwarder {
    transport: Arc<dyn RoundTrip>,
}

impl Forwarder {
    pub fn new(transport: Arc<dyn RoundTrip>) -> Self {
        Self { transport }
    }

    /// Send `request` to its origin and relay the answer.
    ///
    /// Transport failures become a bare `502 Bad Gateway`. The origin body
    /// is streamed, never buffered, and is dropped as soon as the client
    /// response is finished or abandoned.
    pub async fn forward(&self, remote: SocketAddr, mut request: Request<Body>) -> Response {
        append_forwarded_for(request.headers_mut(), remote);

        let method = request.method().clone();
        let uri = request.uri().clone();

        let origin = match self.transport.round_trip(request).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(method = %method, uri = %uri, error = %e, "Upstream error");
                return StatusCode::BAD_GATEWAY.into_response();
            }
        };

        let (parts, body) = origin.into_parts();
        tracing::debug!(method = %method, uri = %uri, status = %parts.status, "Relaying origin response");

        let mut response = Response::new(body);
        copy_headers(response.headers_mut(), &parts.headers);
        *response.status_mut() = parts.status;
        response
    }
}
