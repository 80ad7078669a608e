//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → tls.rs (optional TLS handshake, certificate provisioning)
//!     → Hand off to HTTP layer
//!
//! CONNECT takeover
//!     → connection.rs (tunnel IDs, live tunnel count)
//! ```
//!
//! # Design Decisions
//! - TLS is optional and handled transparently by the listener
//! - Each tunnel is tracked so shutdown can wait for it

pub mod connection;
pub mod tls;
