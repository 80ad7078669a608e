//! Rust Forward HTTP/HTTPS Proxy
//!
//! Browsers and HTTP clients configured to use this proxy send either
//! plain requests, which are forwarded to the origin, or `CONNECT`
//! requests, which become raw byte tunnels to the requested `host:port`.
//!
//! # Architecture Overview
//!
//! ```text
//!                        ┌──────────────────────────────────────────────┐
//!                        │                FORWARD PROXY                 │
//!     Client Request     │  ┌──────────┐    ┌──────────┐                │
//!     ───────────────────┼─▶│ listener │───▶│ dispatch │                │
//!                        │  │ (+ TLS)  │    └────┬─────┘                │
//!                        │  └──────────┘         │                      │
//!                        │            ┌──────────┴──────────┐           │
//!                        │            ▼                     ▼           │
//!                        │     ┌────────────┐        ┌────────────┐     │
//!                        │     │  forward   │        │   tunnel   │     │
//!                        │     │ XFF + relay│        │ dial + ack │     │
//!                        │     └─────┬──────┘        └─────┬──────┘     │
//!                        │           │ HTTP                │ raw TCP    │
//!                        └───────────┼─────────────────────┼────────────┘
//!                                    ▼                     ▼
//!                                  Origin               Origin
//! ```

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;

use forward_proxy::lifecycle::{resolve_config, wait_for_signal, Shutdown, StartupOptions};
use forward_proxy::net::tls::load_tls_config;
use forward_proxy::observability;
use forward_proxy::ProxyServer;

const TUNNEL_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Parser)]
#[command(name = "forward-proxy")]
#[command(about = "Forward HTTP/HTTPS proxy with CONNECT tunneling", long_about = None)]
struct Cli {
    /// listener address e.g: 127.0.0.1:8080
    #[arg(short = 'l', long = "listen")]
    listen: Option<String>,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Serve the listener over TLS with a self-signed certificate
    #[arg(long)]
    tls: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let options = StartupOptions {
        listen: cli.listen,
        config_path: cli.config,
        tls: cli.tls,
    };

    let config = resolve_config(&options)?;
    observability::init_logging(&config.observability);

    tracing::info!("forward-proxy v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        tls = config.listener.tls.is_some(),
        connect_timeout_secs = config.timeouts.connect_secs,
        "Configuration loaded"
    );

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            wait_for_signal().await;
            shutdown.trigger();
        });
    }

    let server = ProxyServer::new(&config);
    let tunnels = server.tunnels();

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    match &config.listener.tls {
        Some(tls) => {
            let rustls = load_tls_config(tls).await?;
            server.run_tls(listener, rustls, server_shutdown).await?;
        }
        None => server.run(listener, server_shutdown).await?,
    }

    if tunnels.active_count() > 0 {
        tracing::info!(active = tunnels.active_count(), "Waiting for open tunnels");
        if tokio::time::timeout(TUNNEL_DRAIN_TIMEOUT, tunnels.wait_until_idle())
            .await
            .is_err()
        {
            tracing::warn!(active = tunnels.active_count(), "Abandoning open tunnels");
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
