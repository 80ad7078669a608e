//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (Axum setup, upgrades enabled)
//!     → dispatch.rs (log request, branch on method)
//!         CONNECT → tunnel subsystem
//!         other   → forward.rs
//!                     → headers.rs (X-Forwarded-For)
//!                     → transport.rs (origin roundtrip)
//!                     → headers.rs (relay origin headers)
//!     → Send to client
//! ```

pub mod dispatch;
pub mod forward;
pub mod headers;
pub mod server;
pub mod transport;

pub use dispatch::AppState;
pub use forward::Forwarder;
pub use headers::{append_forwarded_for, copy_headers, X_FORWARDED_FOR};
pub use server::ProxyServer;
pub use transport::{HyperTransport, RoundTrip, TransportError};
