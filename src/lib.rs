//! Rust Forward HTTP/HTTPS Proxy Library

pub mod config;
pub mod http;
pub mod net;
pub mod tunnel;
pub mod lifecycle;
pub mod observability;

pub use config::schema::ProxyConfig;
pub use http::ProxyServer;
pub use lifecycle::Shutdown;
