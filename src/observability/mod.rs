//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → tracing events (per-request line, tunnel open/close, failures)
//!     → logging.rs (subscriber, filter, formatting)
//! ```
//!
//! # Design Decisions
//! - Structured fields (method, target, client, tunnel_id) on every event
//! - Tunnel events carry a span so both pump directions correlate

pub mod logging;

pub use logging::init_logging;
