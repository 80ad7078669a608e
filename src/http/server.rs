//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum Router with the catch-all dispatcher
//! - Wire up middleware (tracing)
//! - Serve plain HTTP or TLS listeners, both with upgrades enabled so
//!   CONNECT connections can be taken over
//! - Stop accepting on shutdown and drain in-flight requests

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum_server::tls_rustls::RustlsConfig;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::trace::TraceLayer;

use crate::config::ProxyConfig;
use crate::http::dispatch::{dispatch, AppState};
use crate::http::forward::Forwarder;
use crate::http::transport::{HyperTransport, RoundTrip};
use crate::net::connection::TunnelTracker;
use crate::tunnel::TunnelNegotiator;

const TLS_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP server for the forward proxy.
pub struct ProxyServer {
    router: Router,
    tunnels: TunnelTracker,
}

impl ProxyServer {
    /// Create a new server that reaches origins through a pooled hyper client.
    pub fn new(config: &ProxyConfig) -> Self {
        let transport = Arc::new(HyperTransport::new(&config.timeouts));
        Self::with_transport(config, transport)
    }

    /// Create a new server with an explicit origin transport.
    pub fn with_transport(config: &ProxyConfig, transport: Arc<dyn RoundTrip>) -> Self {
        let tunnels = TunnelTracker::new();

        let state = AppState {
            forwarder: Arc::new(Forwarder::new(transport)),
            tunnels: Arc::new(TunnelNegotiator::new(&config.timeouts, tunnels.clone())),
        };

        Self {
            router: Self::build_router(state),
            tunnels,
        }
    }

    /// Build the Axum router.
    ///
    /// There are no routes: CONNECT requests carry an authority instead of a
    /// path and absolute-form requests name foreign hosts, so everything
    /// lands in the fallback.
    fn build_router(state: AppState) -> Router {
        Router::new()
            .fallback(dispatch)
            .with_state(state)
            .layer(TraceLayer::new_for_http())
    }

    /// Run the server on a plain TCP listener until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP proxy listening");

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        tracing::info!("HTTP proxy stopped");
        Ok(())
    }

    /// Run the server as a TLS endpoint on `listener` until `shutdown` fires.
    pub async fn run_tls(
        self,
        listener: TcpListener,
        tls: RustlsConfig,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        let listener = listener.into_std()?;
        let handle = axum_server::Handle::new();

        let shutdown_handle = handle.clone();
        tokio::spawn(async move {
            let _ = shutdown.recv().await;
            shutdown_handle.graceful_shutdown(Some(TLS_DRAIN_TIMEOUT));
        });

        tracing::info!(address = %addr, "HTTPS proxy listening");

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum_server::from_tcp_rustls(listener, tls)
            .handle(handle)
            .serve(app)
            .await?;

        tracing::info!("HTTPS proxy stopped");
        Ok(())
    }

    /// Tracker of the tunnels opened by this server.
    pub fn tunnels(&self) -> TunnelTracker {
        self.tunnels.clone()
    }
}
