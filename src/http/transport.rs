//! Roundtrip transport to origin servers.
//!
//! # Responsibilities
//! - Resolve and connect to the origin named by the request URI
//! - Speak TLS to `https://` origins, plain TCP to `http://` ones
//! - Send the request and hand back the streaming response
//!
//! # Design Decisions
//! - The transport is an injected capability, not ambient state
//! - Connection pooling and connect timeouts live here, not in the forwarder
//! - No retries: a failed roundtrip is reported to the caller as-is

use axum::{
    body::Body,
    http::{Request, Response, Version},
};
use futures_util::future::BoxFuture;
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use thiserror::Error;

use crate::config::TimeoutConfig;

/// Error returned by a [`RoundTrip`] implementation.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("upstream request failed: {0}")]
    Upstream(#[from] hyper_util::client::legacy::Error),

    #[error("{0}")]
    Other(String),
}

/// Something that turns a request into an origin response.
///
/// The transport takes ownership of the request it is given, so callers
/// never observe changes it makes while framing the request.
pub trait RoundTrip: Send + Sync {
    fn round_trip(
        &self,
        request: Request<Body>,
    ) -> BoxFuture<'static, Result<Response<Body>, TransportError>>;
}

/// Pooled HTTP/1.1 client transport built on `hyper-util`.
#[derive(Clone)]
pub struct HyperTransport {
    client: Client<HttpsConnector<HttpConnector>, Body>,
}

impl HyperTransport {
    /// Transport that verifies `https://` origins against the webpki roots.
    pub fn new(timeouts: &TimeoutConfig) -> Self {
        let connector = HttpsConnectorBuilder::new()
            .with_webpki_roots()
            .https_or_http()
            .enable_http1()
            .wrap_connector(http_connector(timeouts));
        Self::from_connector(connector)
    }

    /// Transport that verifies `https://` origins with a caller-supplied
    /// rustls configuration.
    pub fn with_tls_config(timeouts: &TimeoutConfig, tls: rustls::ClientConfig) -> Self {
        let connector = HttpsConnectorBuilder::new()
            .with_tls_config(tls)
            .https_or_http()
            .enable_http1()
            .wrap_connector(http_connector(timeouts));
        Self::from_connector(connector)
    }

    fn from_connector(connector: HttpsConnector<HttpConnector>) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(connector);
        Self { client }
    }
}

fn http_connector(timeouts: &TimeoutConfig) -> HttpConnector {
    let mut connector = HttpConnector::new();
    // The TLS wrapper handles `https`; the inner connector only dials.
    connector.enforce_http(false);
    connector.set_connect_timeout(Some(timeouts.connect()));
    connector
}

impl RoundTrip for HyperTransport {
    fn round_trip(
        &self,
        mut request: Request<Body>,
    ) -> BoxFuture<'static, Result<Response<Body>, TransportError>> {
        let client = self.client.clone();
        Box::pin(async move {
            // Clients may reach us over h2 (TLS listener); origins are spoken
            // to over HTTP/1.1.
            if request.version() == Version::HTTP_2 {
                *request.version_mut() = Version::HTTP_11;
            }

            let response = client.request(request).await?;
            Ok(response.map(Body::new))
        })
    }
}
