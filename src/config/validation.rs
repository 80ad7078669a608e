//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check the listen address resolves to a socket address
//! - Validate value ranges (timeouts > 0)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::ToSocketAddrs;

use thiserror::Error;

use crate::config::schema::ProxyConfig;

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("the listener address [{0}] incorrect, please check it")]
    InvalidListenAddress(String),

    #[error("timeouts.{0} must be greater than zero")]
    ZeroTimeout(&'static str),

    #[error("listener.tls requires both cert_path and key_path, or neither")]
    IncompleteTlsPair,
}

/// Whether `address` resolves to at least one TCP socket address.
pub fn check_address(address: &str) -> bool {
    address
        .to_socket_addrs()
        .map(|mut addrs| addrs.next().is_some())
        .unwrap_or(false)
}

pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if !check_address(&config.listener.bind_address) {
        errors.push(ValidationError::InvalidListenAddress(
            config.listener.bind_address.clone(),
        ));
    }

    if config.timeouts.connect_secs == 0 {
        errors.push(ValidationError::ZeroTimeout("connect_secs"));
    }
    if config.timeouts.tunnel_max_lifetime_secs == Some(0) {
        errors.push(ValidationError::ZeroTimeout("tunnel_max_lifetime_secs"));
    }

    if let Some(tls) = &config.listener.tls {
        if tls.cert_path.is_some() != tls.key_path.is_some() {
            errors.push(ValidationError::IncompleteTlsPair);
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
