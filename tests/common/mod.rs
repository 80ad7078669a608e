//! Shared utilities for integration testing.

use std::io::{BufReader as PemReader, Write};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use forward_proxy::config::{ProxyConfig, TlsConfig};
use forward_proxy::lifecycle::Shutdown;
use forward_proxy::net::connection::TunnelTracker;
use forward_proxy::net::tls::{load_tls_config, provision_certificate, CertificateMaterial};
use forward_proxy::ProxyServer;
use tempfile::NamedTempFile;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

/// A proxy running in the background on an ephemeral port.
#[allow(dead_code)]
pub struct RunningProxy {
    pub addr: SocketAddr,
    pub tunnels: TunnelTracker,
    pub shutdown: Shutdown,
}

/// Start the proxy with `config` on 127.0.0.1 and an ephemeral port.
pub async fn start_proxy(config: ProxyConfig) -> RunningProxy {
    start_server(ProxyServer::new(&config)).await
}

/// Serve an already built proxy on 127.0.0.1 and an ephemeral port.
pub async fn start_server(server: ProxyServer) -> RunningProxy {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let tunnels = server.tunnels();
    let server_shutdown = shutdown.subscribe();

    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    RunningProxy {
        addr,
        tunnels,
        shutdown,
    }
}

/// Start an HTTP origin that answers every request with `status`, an
/// `X-Seen-Forwarded-For` header echoing what it received, and `body`.
#[allow(dead_code)]
pub async fn start_http_origin(status: &'static str, body: &'static str) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            let Ok((socket, _)) = listener.accept().await else {
                break;
            };
            tokio::spawn(async move {
                let mut reader = BufReader::new(socket);
                let mut forwarded_for = String::new();
                loop {
                    let mut line = String::new();
                    if reader.read_line(&mut line).await.unwrap_or(0) == 0 {
                        return;
                    }
                    let line = line.trim_end();
                    if line.is_empty() {
                        break;
                    }
                    if let Some((name, value)) = line.split_once(':') {
                        if name.eq_ignore_ascii_case("x-forwarded-for") {
                            forwarded_for = value.trim().to_string();
                        }
                    }
                }

                let response = format!(
                    "HTTP/1.1 {}\r\nContent-Type: text/plain\r\nSet-Cookie: a=1\r\nSet-Cookie: b=2\r\nX-Seen-Forwarded-For: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    forwarded_for,
                    body.len(),
                    body
                );
                let mut socket = reader.into_inner();
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    addr
}

/// Start a raw TCP origin that echoes every byte back.
#[allow(dead_code)]
pub async fn start_echo_origin() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                break;
            };
            tokio::spawn(async move {
                let (mut read, mut write) = socket.split();
                let _ = tokio::io::copy(&mut read, &mut write).await;
            });
        }
    });

    addr
}

/// Send `CONNECT target` over a fresh connection to the proxy and return
/// the connection together with the raw response head.
#[allow(dead_code)]
pub async fn send_connect(proxy: SocketAddr, target: &str) -> (TcpStream, String) {
    let mut stream = TcpStream::connect(proxy).await.unwrap();
    let request = format!("CONNECT {target} HTTP/1.1\r\nHost: {target}\r\n\r\n");
    stream.write_all(request.as_bytes()).await.unwrap();

    let head = tokio::time::timeout(Duration::from_secs(5), read_head(&mut stream))
        .await
        .expect("proxy did not answer CONNECT");
    (stream, head)
}

/// Read bytes one at a time up to and including the blank line ending a
/// response head, so nothing after it is consumed.
#[allow(dead_code)]
pub async fn read_head<S: AsyncRead + Unpin>(stream: &mut S) -> String {
    let mut head = Vec::new();
    let mut byte = [0u8; 1];
    while !head.ends_with(b"\r\n\r\n") {
        if stream.read(&mut byte).await.unwrap() == 0 {
            break;
        }
        head.push(byte[0]);
    }
    String::from_utf8(head).unwrap()
}

/// A certificate pair written to disk, as an operator would supply it.
/// The files live as long as this value.
#[allow(dead_code)]
pub struct CertificateFiles {
    pub material: CertificateMaterial,
    pub config: TlsConfig,
    _cert: NamedTempFile,
    _key: NamedTempFile,
}

#[allow(dead_code)]
pub fn write_certificate() -> CertificateFiles {
    let material = provision_certificate().unwrap();
    let mut cert = NamedTempFile::new().unwrap();
    let mut key = NamedTempFile::new().unwrap();
    cert.write_all(material.cert_pem.as_bytes()).unwrap();
    key.write_all(material.key_pem.as_bytes()).unwrap();

    let config = TlsConfig {
        cert_path: Some(cert.path().display().to_string()),
        key_path: Some(key.path().display().to_string()),
    };
    CertificateFiles {
        material,
        config,
        _cert: cert,
        _key: key,
    }
}

/// rustls client configuration that trusts only `cert_pem`.
#[allow(dead_code)]
pub fn client_config_trusting(cert_pem: &str) -> rustls::ClientConfig {
    let mut roots = rustls::RootCertStore::empty();
    for cert in rustls_pemfile::certs(&mut PemReader::new(cert_pem.as_bytes())) {
        roots.add(cert.unwrap()).unwrap();
    }
    rustls::ClientConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth()
}

/// A TLS proxy running in the background, with its server task.
#[allow(dead_code)]
pub struct RunningTlsProxy {
    pub addr: SocketAddr,
    pub tunnels: TunnelTracker,
    pub shutdown: Shutdown,
    pub task: JoinHandle<std::io::Result<()>>,
}

/// Start the proxy as a TLS endpoint presenting the certificate in `tls`.
#[allow(dead_code)]
pub async fn start_tls_proxy(config: ProxyConfig, tls: &TlsConfig) -> RunningTlsProxy {
    let rustls = load_tls_config(tls).await.unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let server = ProxyServer::new(&config);
    let tunnels = server.tunnels();
    let task = tokio::spawn(server.run_tls(listener, rustls, shutdown.subscribe()));

    RunningTlsProxy {
        addr,
        tunnels,
        shutdown,
        task,
    }
}

/// Start an HTTPS origin presenting the certificate in `tls` that answers
/// every request with `200` and `body`.
#[allow(dead_code)]
pub async fn start_https_origin(tls: &TlsConfig, body: &'static str) -> SocketAddr {
    let rustls = load_tls_config(tls).await.unwrap();
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.set_nonblocking(true).unwrap();
    let addr = listener.local_addr().unwrap();

    let app = axum::Router::new().fallback(move || async move { body });
    tokio::spawn(async move {
        let _ = axum_server::from_tcp_rustls(listener, rustls)
            .serve(app.into_make_service())
            .await;
    });

    addr
}

/// Open a TLS session to the proxy at `addr`.
#[allow(dead_code)]
pub async fn connect_tls(
    addr: SocketAddr,
    client: rustls::ClientConfig,
) -> tokio_rustls::client::TlsStream<TcpStream> {
    let connector = tokio_rustls::TlsConnector::from(Arc::new(client));
    let tcp = TcpStream::connect(addr).await.unwrap();
    let name = rustls::pki_types::ServerName::try_from("localhost").unwrap();
    connector.connect(name, tcp).await.unwrap()
}
