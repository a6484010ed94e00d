//! Transport abstraction for the session layer.
//!
//! Abstracts over connection-oriented transports that can open independent
//! bidirectional streams to the authority. Production uses plain TCP (one TCP
//! stream per logical stream) or QUIC (native multiplexed streams); tests use
//! Turmoil's simulated TCP.
//!
//! Framing, ordering, and connection-level error signaling are the transport's
//! job. The session layer only ever asks for a new stream or closes the whole
//! connection.

use std::io;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite, DuplexStream};
use tokio_util::sync::CancellationToken;

/// In-memory buffer between a caller and a relayed socket.
pub const RELAY_BUFFER: usize = 64 * 1024;

/// Abstract transport able to dial the authority.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Type representing an established connection to the authority.
    type Connection: TransportConnection;

    /// Connect to a remote endpoint.
    ///
    /// Resolves `remote` (`host:port`), completes any transport-level
    /// handshake (TCP connect, QUIC/TLS), and returns a Connection handle.
    async fn connect(&self, remote: &str) -> io::Result<Self::Connection>;
}

/// A connection to the authority, supporting independent streams.
///
/// Shared read-only between the turn loop and every order sender it creates,
/// so all operations take `&self`.
#[async_trait]
pub trait TransportConnection: Send + Sync + 'static {
    /// Type of stream for sending data.
    type SendStream: AsyncWrite + Unpin + Send + 'static;

    /// Type of stream for receiving data.
    type RecvStream: AsyncRead + Unpin + Send + 'static;

    /// Open a new bidirectional stream.
    ///
    /// Each request/response exchange (join, order submission) gets its own
    /// stream. Fails once the connection has been closed.
    async fn open_bi(&self) -> io::Result<(Self::SendStream, Self::RecvStream)>;

    /// Close the connection with an error code.
    ///
    /// Non-blocking. Streams already open are torn down and streams opened
    /// afterwards fail; the result reports whether the transport could tear
    /// the connection down cleanly.
    fn close(&self, error_code: u64, reason: &str) -> io::Result<()>;
}

/// Hand `socket` to a relay task and return the caller's end of it.
///
/// For transports without native connection teardown (one socket per
/// logical stream): every stream a connection opens shares its `shutdown`
/// token, and cancelling it drops the socket, so the peer sees the close
/// even while nobody is polling the stream. The returned end then reads EOF
/// and rejects writes. A shutdown of the returned end is forwarded to the
/// socket as a half-close. A socket error ends the relay, so the returned
/// end sees it as EOF.
///
/// Must be called from within a tokio runtime.
pub fn relay<S>(socket: S, shutdown: &CancellationToken) -> DuplexStream
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (local, mut remote) = tokio::io::duplex(RELAY_BUFFER);
    let shutdown = shutdown.clone();
    tokio::spawn(async move {
        let mut socket = socket;
        tokio::select! {
            biased;
            () = shutdown.cancelled() => {},
            copied = tokio::io::copy_bidirectional(&mut remote, &mut socket) => {
                if let Err(e) = copied {
                    tracing::debug!(error = %e, "relayed stream ended with error");
                }
            },
        }
    });
    local
}
