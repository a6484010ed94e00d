//! Authority service handle.
//!
//! [`GameService`] is the authority-facing RPC surface: join a team (which
//! yields the snapshot stream) and submit order sets. [`RemoteGame`] implements
//! it over any [`TransportConnection`] by opening one bidirectional stream per
//! call and exchanging framed [`Payload`] values.
//!
//! # Stream usage
//!
//! ```text
//! join:    client ──Join──────────▶ authority
//!          client ◀──Joined──────── authority
//!          client ◀──Snapshot(1)─── authority
//!          client ◀──Snapshot(2)─── authority   (same stream, until EOF)
//!
//! orders:  client ──Orders────────▶ authority   (fresh stream per call)
//!          client ◀──OrderResponse─ authority
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::{FramedRead, FramedWrite};
use touchline_proto::{JoinRequest, OrderResponse, OrderSet, Payload, PayloadCodec, Snapshot};

use crate::{error::SessionError, transport::TransportConnection};

/// Ordered stream of snapshots pushed by the authority.
#[async_trait]
pub trait SnapshotStream: Send + 'static {
    /// Wait for the next snapshot.
    ///
    /// Returns [`SessionError::StreamClosed`] when the authority ended the
    /// stream cleanly and [`SessionError::Stream`] for any other failure.
    async fn recv(&mut self) -> Result<Snapshot, SessionError>;
}

/// Authority-facing RPC handle.
#[async_trait]
pub trait GameService: Send + Sync + 'static {
    /// Join a team; on success the authority starts streaming snapshots.
    async fn join_a_team(
        &self,
        request: JoinRequest,
    ) -> Result<Box<dyn SnapshotStream>, SessionError>;

    /// Submit one order set and wait for the authority's verdict.
    async fn send_orders(&self, order_set: OrderSet) -> Result<OrderResponse, SessionError>;
}

/// [`GameService`] over a transport connection.
pub struct RemoteGame<C> {
    connection: Arc<C>,
}

impl<C: TransportConnection> RemoteGame<C> {
    /// Service handle sharing `connection`.
    pub fn new(connection: Arc<C>) -> Self {
        Self { connection }
    }

    /// Underlying transport connection.
    pub fn connection(&self) -> &Arc<C> {
        &self.connection
    }
}

#[async_trait]
impl<C: TransportConnection> GameService for RemoteGame<C> {
    async fn join_a_team(
        &self,
        request: JoinRequest,
    ) -> Result<Box<dyn SnapshotStream>, SessionError> {
        let handshake = |reason: String| SessionError::Handshake { reason };

        let (send, recv) = self
            .connection
            .open_bi()
            .await
            .map_err(|e| handshake(format!("failed to open join stream: {e}")))?;

        let mut writer = FramedWrite::new(send, PayloadCodec::new());
        writer
            .send(Payload::Join(request))
            .await
            .map_err(|e| handshake(format!("failed to send join request: {e}")))?;

        let mut reader = FramedRead::new(recv, PayloadCodec::new());
        match reader.next().await {
            Some(Ok(Payload::Joined)) => Ok(Box::new(FramedSnapshotStream::new(reader, writer))),
            Some(Ok(Payload::Rejected { reason })) => Err(handshake(reason)),
            Some(Ok(other)) => Err(handshake(format!("unexpected {} reply to join", other.kind()))),
            Some(Err(e)) => Err(handshake(e.to_string())),
            None => Err(handshake("authority closed the join stream".to_string())),
        }
    }

    async fn send_orders(&self, order_set: OrderSet) -> Result<OrderResponse, SessionError> {
        let turn = order_set.turn;
        let failed = |reason: String| SessionError::Transmission { turn, reason };

        let (send, recv) = self
            .connection
            .open_bi()
            .await
            .map_err(|e| failed(format!("failed to open order stream: {e}")))?;

        // Closing the write half finishes the request so the authority can
        // answer without waiting for more frames.
        let mut writer = FramedWrite::new(send, PayloadCodec::new());
        writer.send(Payload::Orders(order_set)).await.map_err(|e| failed(e.to_string()))?;
        writer.close().await.map_err(|e| failed(e.to_string()))?;

        let mut reader = FramedRead::new(recv, PayloadCodec::new());
        match reader.next().await {
            Some(Ok(Payload::OrderResponse(response))) => Ok(response),
            Some(Ok(Payload::Error { reason })) => Err(failed(reason)),
            Some(Ok(other)) => Err(failed(format!("unexpected {} reply to orders", other.kind()))),
            Some(Err(e)) => Err(failed(e.to_string())),
            None => Err(failed("authority closed the order stream without answering".to_string())),
        }
    }
}

/// Snapshot stream reading framed payloads from a transport stream.
///
/// Holds on to the write half of the join stream so the authority never sees
/// a half-closed join while the session is alive.
pub struct FramedSnapshotStream<R, W> {
    reader: FramedRead<R, PayloadCodec>,
    _writer: FramedWrite<W, PayloadCodec>,
}

impl<R, W> FramedSnapshotStream<R, W>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    /// Wrap the two halves of an accepted join stream.
    pub fn new(reader: FramedRead<R, PayloadCodec>, writer: FramedWrite<W, PayloadCodec>) -> Self {
        Self { reader, _writer: writer }
    }
}

#[async_trait]
impl<R, W> SnapshotStream for FramedSnapshotStream<R, W>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    async fn recv(&mut self) -> Result<Snapshot, SessionError> {
        match self.reader.next().await {
            Some(Ok(Payload::Snapshot(snapshot))) => Ok(snapshot),
            Some(Ok(other)) => Err(SessionError::Stream(format!(
                "unexpected {} payload on snapshot stream",
                other.kind()
            ))),
            Some(Err(e)) => Err(SessionError::Stream(e.to_string())),
            None => Err(SessionError::StreamClosed),
        }
    }
}
