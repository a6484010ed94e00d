//! Authenticated QUIC binding.
//!
//! One QUIC connection per session; every bidirectional stream is a native
//! QUIC stream. The authority certificate is verified against the Mozilla
//! root set unless a custom root store is supplied.

use std::{
    io,
    net::{Ipv4Addr, SocketAddr},
    sync::Arc,
};

use async_trait::async_trait;
use quinn::{Endpoint, VarInt};
use rustls::RootCertStore;
use touchline_core::{Transport, TransportConnection};

/// ALPN identifier negotiated with the authority.
pub const ALPN: &[u8] = b"touchline/2";

/// QUIC transport with TLS 1.3 server authentication.
#[derive(Debug, Clone)]
pub struct QuicTransport {
    endpoint: Endpoint,
    server_name: String,
}

impl QuicTransport {
    /// Transport trusting the bundled web PKI roots.
    pub fn new(server_name: impl Into<String>) -> io::Result<Self> {
        let mut roots = RootCertStore::empty();
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        Self::with_roots(server_name, roots)
    }

    /// Transport trusting only `roots`.
    pub fn with_roots(server_name: impl Into<String>, roots: RootCertStore) -> io::Result<Self> {
        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let mut tls = rustls::ClientConfig::builder_with_provider(provider)
            .with_protocol_versions(&[&rustls::version::TLS13])
            .map_err(io::Error::other)?
            .with_root_certificates(roots)
            .with_no_client_auth();
        tls.alpn_protocols = vec![ALPN.to_vec()];

        let crypto = quinn::crypto::rustls::QuicClientConfig::try_from(tls).map_err(io::Error::other)?;
        let mut endpoint = Endpoint::client(SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0)))?;
        endpoint.set_default_client_config(quinn::ClientConfig::new(Arc::new(crypto)));

        Ok(Self { endpoint, server_name: server_name.into() })
    }

    /// Name the authority certificate must be valid for.
    pub fn server_name(&self) -> &str {
        &self.server_name
    }
}

#[async_trait]
impl Transport for QuicTransport {
    type Connection = QuicConnection;

    async fn connect(&self, remote: &str) -> io::Result<QuicConnection> {
        let addr = tokio::net::lookup_host(remote).await?.next().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("no address for {remote}"))
        })?;

        let connection = self
            .endpoint
            .connect(addr, &self.server_name)
            .map_err(io::Error::other)?
            .await
            .map_err(io::Error::from)?;
        tracing::debug!(peer = %addr, server_name = %self.server_name, "quic connection established");

        Ok(QuicConnection { inner: connection })
    }
}

/// QUIC connection to one authority.
#[derive(Debug, Clone)]
pub struct QuicConnection {
    inner: quinn::Connection,
}

#[async_trait]
impl TransportConnection for QuicConnection {
    type SendStream = quinn::SendStream;
    type RecvStream = quinn::RecvStream;

    async fn open_bi(&self) -> io::Result<(Self::SendStream, Self::RecvStream)> {
        self.inner.open_bi().await.map_err(io::Error::from)
    }

    fn close(&self, error_code: u64, reason: &str) -> io::Result<()> {
        let code = VarInt::from_u64(error_code).unwrap_or(VarInt::MAX);
        self.inner.close(code, reason.as_bytes());
        Ok(())
    }
}
