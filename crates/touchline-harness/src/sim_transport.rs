//! Turmoil transport.
//!
//! Simulated TCP has no multiplexing, so each bidirectional stream is its
//! own simulated TCP connection, exactly like the plaintext client binding.
//! Sockets are driven through [`touchline_core::relay`] so that closing the
//! connection drops all of them.

use std::{
    io,
    sync::{
        Mutex, PoisonError,
        atomic::{AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;
use tokio::io::{DuplexStream, ReadHalf, WriteHalf};
use touchline_core::{CancellationToken, Transport, TransportConnection, relay};
use turmoil::net::TcpStream;

/// Transport dialing simulated hosts by name (`"authority:5000"`).
#[derive(Debug, Clone, Copy, Default)]
pub struct SimTransport;

#[async_trait]
impl Transport for SimTransport {
    type Connection = SimConnection;

    async fn connect(&self, remote: &str) -> io::Result<SimConnection> {
        let stream = TcpStream::connect(remote).await?;
        Ok(SimConnection {
            remote: remote.to_string(),
            pending: Mutex::new(Some(stream)),
            shutdown: CancellationToken::new(),
            close_count: AtomicUsize::new(0),
        })
    }
}

/// Simulated connection to one host.
pub struct SimConnection {
    remote: String,
    pending: Mutex<Option<TcpStream>>,
    shutdown: CancellationToken,
    close_count: AtomicUsize,
}

impl SimConnection {
    /// Whether the connection has been closed.
    pub fn is_closed(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Number of times [`TransportConnection::close`] was called.
    pub fn close_count(&self) -> usize {
        self.close_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TransportConnection for SimConnection {
    type SendStream = WriteHalf<DuplexStream>;
    type RecvStream = ReadHalf<DuplexStream>;

    async fn open_bi(&self) -> io::Result<(Self::SendStream, Self::RecvStream)> {
        let closed = || io::Error::new(io::ErrorKind::NotConnected, "connection closed");
        if self.is_closed() {
            return Err(closed());
        }

        let pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner).take();
        let stream = match pending {
            Some(stream) => stream,
            None => TcpStream::connect(self.remote.as_str()).await?,
        };
        if self.is_closed() {
            return Err(closed());
        }

        let (recv, send) = tokio::io::split(relay(stream, &self.shutdown));
        Ok((send, recv))
    }

    fn close(&self, _error_code: u64, _reason: &str) -> io::Result<()> {
        self.close_count.fetch_add(1, Ordering::SeqCst);
        self.shutdown.cancel();
        self.pending.lock().unwrap_or_else(PoisonError::into_inner).take();
        Ok(())
    }
}
