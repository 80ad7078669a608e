//! Header relay and client attribution.
//!
//! # Responsibilities
//! - Copy origin response headers onto the client response (additive)
//! - Append the client IP to X-Forwarded-For, keeping prior hops
//!
//! # Design Decisions
//! - Copying always appends; values already on the destination survive
//! - X-Forwarded-For is collapsed into a single comma-joined value

use std::net::SocketAddr;

use axum::http::header::{HeaderMap, HeaderName, HeaderValue};

/// `X-Forwarded-For` header name.
pub const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");

/// Append every value of every header in `src` onto `dst`.
///
/// Per-key order from `src` is preserved and nothing already present in
/// `dst` is replaced.
pub fn copy_headers(dst: &mut HeaderMap, src: &HeaderMap) {
    for (name, value) in src.iter() {
        dst.append(name.clone(), value.clone());
    }
}

/// Record `remote` as the latest hop in `X-Forwarded-For`.
///
/// Existing values (possibly spread across several header lines) are
/// joined with `", "` and the client IP is appended, so no earlier hop is
/// dropped. The port of `remote` is never recorded.
pub fn append_forwarded_for(headers: &mut HeaderMap, remote: SocketAddr) {
    let client_ip = remote.ip().to_string();

    let mut chain: Vec<u8> = Vec::new();
    for prior in headers.get_all(&X_FORWARDED_FOR) {
        chain.extend_from_slice(prior.as_bytes());
        chain.extend_from_slice(b", ");
    }
    chain.extend_from_slice(client_ip.as_bytes());

    match HeaderValue::from_bytes(&chain) {
        Ok(value) => {
            headers.insert(X_FORWARDED_FOR, value);
        }
        Err(e) => tracing::warn!(error = %e, client = %client_ip, "Could not encode X-Forwarded-For"),
    }
}
