//! Tunnel negotiation failures and their client-facing status codes.

use std::time::Duration;

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Errors that end a CONNECT attempt before any tunnel byte flows.
#[derive(Debug, Error)]
pub enum TunnelError {
    /// The request line did not carry a `host:port` authority.
    #[error("CONNECT target must be host:port, got {0:?}")]
    MissingAuthority(String),

    /// Origin refused, unreachable, or its name did not resolve.
    #[error("dial tcp {target}: {source}")]
    Dial {
        target: String,
        #[source]
        source: std::io::Error,
    },

    /// Origin did not accept the connection in time.
    #[error("dial tcp {target}: i/o timeout after {timeout:?}")]
    DialTimeout { target: String, timeout: Duration },

    /// The serving layer cannot hand over the raw connection.
    #[error("Hijacking not supported")]
    HijackUnsupported,

    /// Detaching the client connection from HTTP framing failed.
    #[error("connection takeover failed: {0}")]
    Takeover(#[source] hyper::Error),
}

impl TunnelError {
    pub fn status(&self) -> StatusCode {
        match self {
            TunnelError::MissingAuthority(_) => StatusCode::BAD_REQUEST,
            TunnelError::Dial { .. } | TunnelError::DialTimeout { .. } => StatusCode::BAD_GATEWAY,
            TunnelError::HijackUnsupported => StatusCode::INTERNAL_SERVER_ERROR,
            TunnelError::Takeover(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for TunnelError {
    fn into_response(self) -> Response {
        (
            self.status(),
            [
                (header::CONTENT_TYPE, "text/plain; charset=utf-8"),
                (header::X_CONTENT_TYPE_OPTIONS, "nosniff"),
            ],
            format!("{}\n", self),
        )
            .into_response()
    }
}
