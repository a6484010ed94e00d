//! Touchline network client
//!
//! Binds the transport-agnostic session layer in `touchline-core` to real
//! networks:
//!
//! - [`TcpTransport`]: plaintext TCP, one socket per logical stream
//! - [`QuicTransport`]: TLS 1.3 authenticated QUIC (`transport` feature)
//!
//! [`connect`] picks the binding from [`SessionConfig::security`] and runs the
//! join handshake:
//!
//! ```ignore
//! let config = SessionConfig::from_env()?;
//! let (lifetime, session) = touchline_client::connect(&config).await?;
//! session.on_new_turn(my_bot, Arc::new(TracingLogger::for_config(&config)))?;
//! lifetime.cancelled().await;
//! ```

#![forbid(unsafe_code)]

#[cfg(feature = "transport")]
mod quic;
mod tcp;

use std::io;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};
#[cfg(feature = "transport")]
pub use quic::{ALPN, QuicConnection, QuicTransport};
pub use tcp::{TcpConnection, TcpTransport};
use touchline_core::{
    CancellationToken, SecurityMode, Session, SessionConfig, SessionError, Transport,
    TransportConnection,
};

/// Transport selected from a [`SecurityMode`].
#[derive(Debug, Clone)]
pub enum ClientTransport {
    /// Plaintext TCP.
    Tcp(TcpTransport),
    /// Authenticated QUIC.
    #[cfg(feature = "transport")]
    Quic(QuicTransport),
}

impl ClientTransport {
    /// Transport matching `security`.
    ///
    /// Fails with [`io::ErrorKind::Unsupported`] when authenticated transport
    /// is requested but the crate was built without the `transport` feature.
    pub fn for_security(security: &SecurityMode) -> io::Result<Self> {
        match security {
            SecurityMode::Plaintext => Ok(Self::Tcp(TcpTransport::new())),
            #[cfg(feature = "transport")]
            SecurityMode::Authenticated { server_name } => {
                Ok(Self::Quic(QuicTransport::new(server_name.clone())?))
            },
            #[cfg(not(feature = "transport"))]
            SecurityMode::Authenticated { .. } => Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "authenticated transport requires the `transport` feature",
            )),
        }
    }
}

#[async_trait]
impl Transport for ClientTransport {
    type Connection = ClientConnection;

    async fn connect(&self, remote: &str) -> io::Result<ClientConnection> {
        match self {
            Self::Tcp(tcp) => tcp.connect(remote).await.map(ClientConnection::Tcp),
            #[cfg(feature = "transport")]
            Self::Quic(quic) => quic.connect(remote).await.map(ClientConnection::Quic),
        }
    }
}

/// Connection produced by [`ClientTransport`].
#[derive(Debug)]
pub enum ClientConnection {
    /// Plaintext TCP.
    Tcp(TcpConnection),
    /// Authenticated QUIC.
    #[cfg(feature = "transport")]
    Quic(QuicConnection),
}

#[async_trait]
impl TransportConnection for ClientConnection {
    type SendStream = Box<dyn AsyncWrite + Unpin + Send>;
    type RecvStream = Box<dyn AsyncRead + Unpin + Send>;

    async fn open_bi(&self) -> io::Result<(Self::SendStream, Self::RecvStream)> {
        match self {
            Self::Tcp(tcp) => {
                let (send, recv) = tcp.open_bi().await?;
                Ok((Box::new(send), Box::new(recv)))
            },
            #[cfg(feature = "transport")]
            Self::Quic(quic) => {
                let (send, recv) = quic.open_bi().await?;
                Ok((Box::new(send), Box::new(recv)))
            },
        }
    }

    fn close(&self, error_code: u64, reason: &str) -> io::Result<()> {
        match self {
            Self::Tcp(tcp) => tcp.close(error_code, reason),
            #[cfg(feature = "transport")]
            Self::Quic(quic) => quic.close(error_code, reason),
        }
    }
}

/// Dial the authority named in `config` and join a team.
///
/// # Errors
///
/// [`SessionError::Connection`] when the transport cannot be built or the
/// authority is unreachable, [`SessionError::Handshake`] when the join fails.
pub async fn connect(
    config: &SessionConfig,
) -> Result<(CancellationToken, Session<ClientConnection>), SessionError> {
    let transport = ClientTransport::for_security(&config.security)
        .map_err(|source| SessionError::Connection { addr: config.authority_addr.clone(), source })?;
    Session::create(&transport, config).await
}
