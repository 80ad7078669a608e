//! CONNECT tunneling subsystem.
//!
//! # Data Flow
//! ```text
//! CONNECT host:port
//!     → negotiator.rs (dial origin, 200 ack, take over connection)
//!     → pump.rs ×2 (client → origin, origin → client)
//!     → either side closes → both sides closed
//! ```
//!
//! # Design Decisions
//! - Only the dial is time-bounded; an optional lifetime cap closes long tunnels
//! - Tunneled bytes are never inspected
//! - Closing a stream is the only cancellation mechanism

pub mod error;
pub mod negotiator;
pub mod pump;

pub use error::TunnelError;
pub use negotiator::{splice, TunnelNegotiator, TunnelStats};
pub use pump::{pump, CloseLatch};
