//! Plaintext TCP binding.
//!
//! TCP has no stream multiplexing, so every bidirectional stream is its own
//! TCP connection to the same peer. The connection dialed by
//! [`TcpTransport::connect`] is kept and handed out by the first
//! [`TcpConnection::open_bi`] (the join stream); later calls dial again.
//!
//! Every socket is driven through [`touchline_core::relay`], so closing the
//! connection shuts down all of them at once, including ones nobody is
//! currently reading.

use std::{
    io,
    net::SocketAddr,
    sync::{Mutex, PoisonError},
};

use async_trait::async_trait;
use tokio::{
    io::{DuplexStream, ReadHalf, WriteHalf},
    net::{TcpStream, ToSocketAddrs},
};
use touchline_core::{CancellationToken, Transport, TransportConnection, relay};

/// Plaintext TCP transport.
#[derive(Debug, Clone)]
pub struct TcpTransport {
    nodelay: bool,
}

impl TcpTransport {
    /// Transport with Nagle's algorithm disabled.
    pub fn new() -> Self {
        Self { nodelay: true }
    }

    /// Set `TCP_NODELAY` on every dialed socket.
    #[must_use]
    pub fn with_nodelay(mut self, nodelay: bool) -> Self {
        self.nodelay = nodelay;
        self
    }
}

impl Default for TcpTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for TcpTransport {
    type Connection = TcpConnection;

    async fn connect(&self, remote: &str) -> io::Result<TcpConnection> {
        let stream = dial(remote, self.nodelay).await?;
        let peer = stream.peer_addr()?;
        tracing::debug!(%peer, "tcp connection established");

        Ok(TcpConnection {
            peer,
            nodelay: self.nodelay,
            pending: Mutex::new(Some(stream)),
            shutdown: CancellationToken::new(),
        })
    }
}

/// Connection to one authority over TCP.
#[derive(Debug)]
pub struct TcpConnection {
    peer: SocketAddr,
    nodelay: bool,
    pending: Mutex<Option<TcpStream>>,
    shutdown: CancellationToken,
}

impl TcpConnection {
    /// Authority address this connection dials.
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Whether [`TransportConnection::close`] has been called.
    pub fn is_closed(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    fn not_connected() -> io::Error {
        io::Error::new(io::ErrorKind::NotConnected, "connection closed")
    }
}

#[async_trait]
impl TransportConnection for TcpConnection {
    type SendStream = WriteHalf<DuplexStream>;
    type RecvStream = ReadHalf<DuplexStream>;

    async fn open_bi(&self) -> io::Result<(Self::SendStream, Self::RecvStream)> {
        if self.is_closed() {
            return Err(Self::not_connected());
        }

        let pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner).take();
        let stream = match pending {
            Some(stream) => stream,
            None => dial(self.peer, self.nodelay).await?,
        };
        // Closed while dialing.
        if self.is_closed() {
            return Err(Self::not_connected());
        }

        let (read, write) = tokio::io::split(relay(stream, &self.shutdown));
        Ok((write, read))
    }

    fn close(&self, error_code: u64, reason: &str) -> io::Result<()> {
        if !self.is_closed() {
            tracing::debug!(peer = %self.peer, error_code, reason, "closing tcp connection");
        }
        self.shutdown.cancel();
        // Drop an unused join socket so the authority sees the close.
        self.pending.lock().unwrap_or_else(PoisonError::into_inner).take();
        Ok(())
    }
}

async fn dial(remote: impl ToSocketAddrs, nodelay: bool) -> io::Result<TcpStream> {
    let stream = TcpStream::connect(remote).await?;
    stream.set_nodelay(nodelay)?;
    Ok(stream)
}
