//! CONNECT negotiation and tunnel supervision.
//!
//! # State Machine
//! ```text
//! START → DIALING → ACK_SENT → HIJACKED → PUMPING → CLOSED
//!            │          │          │
//!            └──────────┴──────────┴──→ FAILED
//! ```
//!
//! The takeover capability is checked before the acknowledgment is built:
//! once the `200` is handed to hyper no other status can follow it.

use std::net::SocketAddr;
use std::time::Duration;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
};
use hyper::upgrade::OnUpgrade;
use hyper_util::rt::TokioIo;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tracing::Instrument;

use crate::config::TimeoutConfig;
use crate::net::connection::{TunnelGuard, TunnelTracker};
use crate::tunnel::error::TunnelError;
use crate::tunnel::pump::{pump, CloseLatch};

/// Byte counts of a finished tunnel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TunnelStats {
    pub client_to_origin: u64,
    pub origin_to_client: u64,
}

/// Handles CONNECT requests.
#[derive(Debug, Clone)]
pub struct TunnelNegotiator {
    connect_timeout: Duration,
    max_lifetime: Option<Duration>,
    tracker: TunnelTracker,
}

impl TunnelNegotiator {
    pub fn new(timeouts: &TimeoutConfig, tracker: TunnelTracker) -> Self {
        Self {
            connect_timeout: timeouts.connect(),
            max_lifetime: timeouts.tunnel_max_lifetime(),
            tracker,
        }
    }

    /// Answer a CONNECT request.
    ///
    /// On success the returned response is the bodiless `200` acknowledgment
    /// and a background task takes over the connection once hyper has
    /// flushed it.
    pub async fn negotiate(&self, remote: SocketAddr, request: Request<Body>) -> Response {
        match self.establish(remote, request).await {
            Ok(ack) => ack,
            Err(e) => {
                tracing::warn!(client = %remote, status = %e.status(), error = %e, "Tunnel failed");
                e.into_response()
            }
        }
    }

    async fn establish(
        &self,
        remote: SocketAddr,
        mut request: Request<Body>,
    ) -> Result<Response, TunnelError> {
        let target = request
            .uri()
            .authority()
            .map(|authority| authority.to_string())
            .ok_or_else(|| TunnelError::MissingAuthority(request.uri().to_string()))?;

        let origin = self.dial(&target).await?;

        // Dropping `origin` on this error path closes the dialed connection.
        let on_upgrade = request
            .extensions_mut()
            .remove::<OnUpgrade>()
            .ok_or(TunnelError::HijackUnsupported)?;

        let guard = self.tracker.track();
        let span = tracing::info_span!("tunnel", id = %guard.id(), target = %target, client = %remote);
        let max_lifetime = self.max_lifetime;

        tokio::spawn(
            async move {
                match on_upgrade.await {
                    Ok(upgraded) => {
                        tracing::info!("Tunnel established");
                        run_tunnel(TokioIo::new(upgraded), origin, max_lifetime, guard).await;
                    }
                    Err(e) => {
                        let e = TunnelError::Takeover(e);
                        tracing::warn!(status = %e.status(), error = %e, "Closing origin connection");
                    }
                }
            }
            .instrument(span),
        );

        Ok(StatusCode::OK.into_response())
    }

    async fn dial(&self, target: &str) -> Result<TcpStream, TunnelError> {
        match tokio::time::timeout(self.connect_timeout, TcpStream::connect(target)).await {
            Ok(Ok(stream)) => Ok(stream),
            Ok(Err(source)) => Err(TunnelError::Dial {
                target: target.to_string(),
                source,
            }),
            Err(_) => Err(TunnelError::DialTimeout {
                target: target.to_string(),
                timeout: self.connect_timeout,
            }),
        }
    }
}

async fn run_tunnel<C, O>(client: C, origin: O, max_lifetime: Option<Duration>, guard: TunnelGuard)
where
    C: AsyncRead + AsyncWrite + Send + 'static,
    O: AsyncRead + AsyncWrite + Send + 'static,
{
    let stats = splice(client, origin, max_lifetime).await;
    tracing::info!(
        tunnel_id = %guard.id(),
        client_to_origin = stats.client_to_origin,
        origin_to_client = stats.origin_to_client,
        "Tunnel closed"
    );
}

/// Wire `client` and `origin` together with two independent pumps and
/// wait for both to finish.
///
/// With `max_lifetime` set, the pair is closed once it has been open that
/// long.
pub async fn splice<C, O>(client: C, origin: O, max_lifetime: Option<Duration>) -> TunnelStats
where
    C: AsyncRead + AsyncWrite + Send + 'static,
    O: AsyncRead + AsyncWrite + Send + 'static,
{
    let (client_read, client_write) = tokio::io::split(client);
    let (origin_read, origin_write) = tokio::io::split(origin);
    let latch = CloseLatch::new();

    let upstream = tokio::spawn(pump(origin_write, client_read, latch.clone()));
    let downstream = tokio::spawn(pump(client_write, origin_read, latch.clone()));

    let both = async { tokio::join!(upstream, downstream) };
    tokio::pin!(both);

    let (upstream, downstream) = match max_lifetime {
        Some(limit) => match tokio::time::timeout(limit, &mut both).await {
            Ok(finished) => finished,
            Err(_) => {
                tracing::info!(max_lifetime = ?limit, "Tunnel reached maximum lifetime");
                latch.close();
                both.await
            }
        },
        None => both.await,
    };

    TunnelStats {
        client_to_origin: upstream.unwrap_or_default(),
        origin_to_client: downstream.unwrap_or_default(),
    }
}
