//! In-memory transport and service doubles for unit tests.

use std::{
    io,
    sync::{
        Mutex, PoisonError,
        atomic::{AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::{
    io::{AsyncWriteExt, DuplexStream, ReadHalf, WriteHalf},
    sync::mpsc,
};
use tokio_util::{codec::Framed, sync::CancellationToken};
use touchline_proto::{JoinRequest, OrderResponse, OrderSet, Payload, PayloadCodec, Snapshot};

use crate::{
    error::SessionError,
    service::{GameService, SnapshotStream},
    transport::{RELAY_BUFFER, Transport, TransportConnection, relay},
};

/// Connection whose streams are in-memory duplex pipes.
///
/// The authority side of every opened stream is delivered on the receiver
/// returned by [`DuplexConnection::new`]. Closing tears down every stream
/// opened so far, the same way the socket transports do.
pub(crate) struct DuplexConnection {
    accepted: mpsc::UnboundedSender<DuplexStream>,
    shutdown: CancellationToken,
    close_calls: AtomicUsize,
}

impl DuplexConnection {
    pub(crate) fn new() -> (Self, mpsc::UnboundedReceiver<DuplexStream>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let connection =
            Self { accepted: tx, shutdown: CancellationToken::new(), close_calls: AtomicUsize::new(0) };
        (connection, rx)
    }

    pub(crate) fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TransportConnection for DuplexConnection {
    type SendStream = WriteHalf<DuplexStream>;
    type RecvStream = ReadHalf<DuplexStream>;

    async fn open_bi(&self) -> io::Result<(Self::SendStream, Self::RecvStream)> {
        if self.shutdown.is_cancelled() {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "connection closed"));
        }
        let (client, server) = tokio::io::duplex(RELAY_BUFFER);
        self.accepted
            .send(server)
            .map_err(|_| io::Error::new(io::ErrorKind::ConnectionRefused, "authority gone"))?;
        let (read, write) = tokio::io::split(relay(client, &self.shutdown));
        Ok((write, read))
    }

    fn close(&self, _error_code: u64, _reason: &str) -> io::Result<()> {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        self.shutdown.cancel();
        Ok(())
    }
}

/// Transport handing out a prepared [`DuplexConnection`], or failing to dial.
pub(crate) struct DuplexTransport {
    connection: Mutex<Option<DuplexConnection>>,
}

impl DuplexTransport {
    pub(crate) fn new(connection: DuplexConnection) -> Self {
        Self { connection: Mutex::new(Some(connection)) }
    }

    pub(crate) fn unreachable() -> Self {
        Self { connection: Mutex::new(None) }
    }
}

#[async_trait]
impl Transport for DuplexTransport {
    type Connection = DuplexConnection;

    async fn connect(&self, remote: &str) -> io::Result<DuplexConnection> {
        self.connection.lock().unwrap_or_else(PoisonError::into_inner).take().ok_or_else(|| {
            io::Error::new(io::ErrorKind::ConnectionRefused, format!("nothing listening on {remote}"))
        })
    }
}

/// Authority side of one duplex stream.
pub(crate) struct ServerEnd {
    framed: Framed<DuplexStream, PayloadCodec>,
}

impl ServerEnd {
    pub(crate) async fn accept(accepted: &mut mpsc::UnboundedReceiver<DuplexStream>) -> Self {
        let stream = accepted.recv().await.expect("client opened a stream");
        Self { framed: Framed::new(stream, PayloadCodec::new()) }
    }

    pub(crate) async fn recv(&mut self) -> Option<Payload> {
        self.framed.next().await.map(|frame| frame.expect("valid frame"))
    }

    pub(crate) async fn send(&mut self, payload: Payload) {
        self.framed.send(payload).await.expect("send payload");
    }

    pub(crate) async fn write_raw(&mut self, bytes: &[u8]) {
        self.framed.get_mut().write_all(bytes).await.expect("write raw bytes");
    }

    pub(crate) async fn shutdown(&mut self) {
        self.framed.get_mut().shutdown().await.expect("shutdown");
    }
}

/// Snapshot stream fed from a channel. A dropped sender reads as a clean
/// close.
pub(crate) struct ChannelStream {
    rx: mpsc::UnboundedReceiver<Result<Snapshot, SessionError>>,
}

impl ChannelStream {
    pub(crate) fn new() -> (Self, mpsc::UnboundedSender<Result<Snapshot, SessionError>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { rx }, tx)
    }
}

#[async_trait]
impl SnapshotStream for ChannelStream {
    async fn recv(&mut self) -> Result<Snapshot, SessionError> {
        self.rx.recv().await.unwrap_or(Err(SessionError::StreamClosed))
    }
}

/// Service that records order sets and accepts all of them.
#[derive(Default)]
pub(crate) struct RecordingService {
    orders: Mutex<Vec<OrderSet>>,
}

impl RecordingService {
    pub(crate) fn orders(&self) -> Vec<OrderSet> {
        self.orders.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

#[async_trait]
impl GameService for RecordingService {
    async fn join_a_team(
        &self,
        _request: JoinRequest,
    ) -> Result<Box<dyn SnapshotStream>, SessionError> {
        Err(SessionError::Handshake { reason: "recording service does not stream".into() })
    }

    async fn send_orders(&self, order_set: OrderSet) -> Result<OrderResponse, SessionError> {
        let details = format!("turn {}", order_set.turn);
        self.orders.lock().unwrap_or_else(PoisonError::into_inner).push(order_set);
        Ok(OrderResponse::success(details))
    }
}
