//! TLS configuration and certificate provisioning.
//!
//! The listener can present either a certificate loaded from PEM files or
//! a self-signed one generated at startup. Either way the PEM pair is
//! checked before it reaches rustls so a bad file fails with a clear error.

use std::io::BufReader;
use std::path::Path;

use axum_server::tls_rustls::RustlsConfig;
use rcgen::{CertificateParams, DnType, ExtendedKeyUsagePurpose, KeyPair, KeyUsagePurpose};
use thiserror::Error;

use crate::config::TlsConfig;

const CERT_ORGANIZATION: &str = "forward-proxy";

/// Error type for TLS setup.
#[derive(Debug, Error)]
pub enum TlsError {
    #[error("certificate generation failed: {0}")]
    Generate(#[from] rcgen::Error),

    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("no certificate found in {0}")]
    NoCertificate(String),

    #[error("no private key found in {0}")]
    NoPrivateKey(String),

    #[error("invalid PEM in {origin}: {source}")]
    Pem {
        origin: String,
        #[source]
        source: std::io::Error,
    },

    #[error("rustls rejected the certificate: {0}")]
    Rustls(#[source] std::io::Error),
}

/// A PEM-encoded certificate and its private key.
#[derive(Debug, Clone)]
pub struct CertificateMaterial {
    pub cert_pem: String,
    pub key_pem: String,
}

/// Generate a self-signed server certificate for `localhost` / `127.0.0.1`.
pub fn provision_certificate() -> Result<CertificateMaterial, TlsError> {
    let mut params = CertificateParams::new(vec!["localhost".to_string(), "127.0.0.1".to_string()])?;
    params
        .distinguished_name
        .push(DnType::OrganizationName, CERT_ORGANIZATION);
    params.key_usages = vec![
        KeyUsagePurpose::DigitalSignature,
        KeyUsagePurpose::KeyEncipherment,
    ];
    params.extended_key_usages = vec![ExtendedKeyUsagePurpose::ServerAuth];

    let key_pair = KeyPair::generate()?;
    let cert = params.self_signed(&key_pair)?;

    Ok(CertificateMaterial {
        cert_pem: cert.pem(),
        key_pem: key_pair.serialize_pem(),
    })
}

/// Check that `cert` holds at least one certificate and `key` a private key.
pub fn check_pem_pair(cert: &[u8], key: &[u8], origin: &str) -> Result<(), TlsError> {
    let pem_error = |source| TlsError::Pem {
        origin: origin.to_string(),
        source,
    };

    let certs = rustls_pemfile::certs(&mut BufReader::new(cert))
        .collect::<Result<Vec<_>, _>>()
        .map_err(pem_error)?;
    if certs.is_empty() {
        return Err(TlsError::NoCertificate(origin.to_string()));
    }

    match rustls_pemfile::private_key(&mut BufReader::new(key)).map_err(pem_error)? {
        Some(_) => Ok(()),
        None => Err(TlsError::NoPrivateKey(origin.to_string())),
    }
}

/// Build the rustls configuration for the listener.
pub async fn load_tls_config(config: &TlsConfig) -> Result<RustlsConfig, TlsError> {
    let (cert, key, origin) = match (&config.cert_path, &config.key_path) {
        (Some(cert_path), Some(key_path)) => {
            let cert = read_pem(Path::new(cert_path)).await?;
            let key = read_pem(Path::new(key_path)).await?;
            (cert, key, cert_path.clone())
        }
        _ => {
            let material = provision_certificate()?;
            tracing::info!(organization = CERT_ORGANIZATION, "Generated self-signed certificate");
            (
                material.cert_pem.into_bytes(),
                material.key_pem.into_bytes(),
                "generated certificate".to_string(),
            )
        }
    };

    check_pem_pair(&cert, &key, &origin)?;
    RustlsConfig::from_pem(cert, key).await.map_err(TlsError::Rustls)
}

async fn read_pem(path: &Path) -> Result<Vec<u8>, TlsError> {
    tokio::fs::read(path).await.map_err(|source| TlsError::Read {
        path: path.display().to_string(),
        source,
    })
}
