//! Scripted match authority for simulation tests.
//!
//! Every accepted connection carries exactly one logical stream. The first
//! frame decides what it is:
//!
//! - `Join`: reply `Joined` (or `Rejected`), play the snapshot script at a
//!   fixed interval, then end the stream as configured
//! - `Orders`: record the order set and answer with a success response, or
//!   hold the stream open without answering when scripted silent
//!
//! Everything the authority receives is recorded for assertions after
//! `sim.run()`.

use std::{
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use bytes::BytesMut;
use futures::{SinkExt, StreamExt};
use tokio::io::AsyncWriteExt;
use tokio_util::codec::{Encoder, Framed};
use touchline_proto::{JoinRequest, OrderResponse, OrderSet, Payload, PayloadCodec, Snapshot};
use turmoil::net::{TcpListener, TcpStream};

/// How the authority ends a snapshot stream once the script is exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StreamEnding {
    /// Finish the stream cleanly.
    #[default]
    Close,
    /// Cut the stream mid-frame.
    Abort,
    /// Keep the stream open until the client goes away.
    HoldOpen,
}

#[derive(Debug, Clone)]
struct Script {
    snapshots: Vec<Snapshot>,
    interval: Duration,
    ending: StreamEnding,
    reject: Option<String>,
    answer_orders: bool,
}

#[derive(Debug, Default)]
struct Recorded {
    joins: Vec<JoinRequest>,
    orders: Vec<OrderSet>,
    hangups: usize,
}

/// Match authority playing a fixed snapshot script.
#[derive(Debug, Clone)]
pub struct SimAuthority {
    script: Arc<Script>,
    recorded: Arc<Mutex<Recorded>>,
}

impl SimAuthority {
    /// Authority streaming one snapshot per turn in `1..=turns`, 100ms apart.
    pub fn with_turns(turns: u32) -> Self {
        Self::with_snapshots((1..=turns).map(Snapshot::at_turn).collect())
    }

    /// Authority streaming `snapshots` in order, 100ms apart.
    pub fn with_snapshots(snapshots: Vec<Snapshot>) -> Self {
        let script = Script {
            snapshots,
            interval: Duration::from_millis(100),
            ending: StreamEnding::Close,
            reject: None,
            answer_orders: true,
        };
        Self { script: Arc::new(script), recorded: Arc::default() }
    }

    /// Set the delay before each snapshot.
    #[must_use]
    pub fn interval(self, interval: Duration) -> Self {
        self.edit(|script| script.interval = interval)
    }

    /// Set how the snapshot stream ends.
    #[must_use]
    pub fn ending(self, ending: StreamEnding) -> Self {
        self.edit(|script| script.ending = ending)
    }

    /// Refuse every join with `reason`.
    #[must_use]
    pub fn rejecting(self, reason: impl Into<String>) -> Self {
        let reason = reason.into();
        self.edit(|script| script.reject = Some(reason))
    }

    /// Record order sets but never answer them.
    #[must_use]
    pub fn silent_orders(self) -> Self {
        self.edit(|script| script.answer_orders = false)
    }

    fn edit(self, f: impl FnOnce(&mut Script)) -> Self {
        let mut script = (*self.script).clone();
        f(&mut script);
        Self { script: Arc::new(script), recorded: self.recorded }
    }

    /// Join requests received so far.
    pub fn joins(&self) -> Vec<JoinRequest> {
        self.recorded().joins.clone()
    }

    /// Order sets received so far, in arrival order.
    pub fn orders(&self) -> Vec<OrderSet> {
        self.recorded().orders.clone()
    }

    /// Snapshot streams the client closed before the authority ended them.
    pub fn hangups(&self) -> usize {
        self.recorded().hangups
    }

    fn recorded(&self) -> std::sync::MutexGuard<'_, Recorded> {
        self.recorded.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Accept connections on `addr` forever.
    pub async fn serve(self, addr: &str) -> std::io::Result<()> {
        let listener = TcpListener::bind(addr).await?;
        loop {
            let (socket, peer) = listener.accept().await?;
            let authority = self.clone();
            tokio::spawn(async move {
                if let Err(reason) = authority.handle(socket).await {
                    tracing::warn!(%peer, %reason, "authority dropped stream");
                }
            });
        }
    }

    async fn handle(&self, socket: TcpStream) -> Result<(), String> {
        let mut framed = Framed::new(socket, PayloadCodec::new());
        let first = match framed.next().await {
            Some(frame) => frame.map_err(|e| e.to_string())?,
            None => return Ok(()),
        };

        match first {
            Payload::Join(request) => self.play(framed, request).await,
            Payload::Orders(order_set) => {
                let details = format!("accepted orders for turn {}", order_set.turn);
                self.recorded().orders.push(order_set);
                if !self.script.answer_orders {
                    // Keep the socket so the client sees neither a reply nor a close.
                    let _held = framed;
                    return futures::future::pending().await;
                }
                framed
                    .send(Payload::OrderResponse(OrderResponse::success(details)))
                    .await
                    .map_err(|e| e.to_string())
            },
            other => {
                let reason = format!("unexpected {} request", other.kind());
                framed.send(Payload::Error { reason: reason.clone() }).await.map_err(|e| e.to_string())?;
                Err(reason)
            },
        }
    }

    async fn play(
        &self,
        mut framed: Framed<TcpStream, PayloadCodec>,
        request: JoinRequest,
    ) -> Result<(), String> {
        self.recorded().joins.push(request);

        if let Some(reason) = &self.script.reject {
            return framed
                .send(Payload::Rejected { reason: reason.clone() })
                .await
                .map_err(|e| e.to_string());
        }
        framed.send(Payload::Joined).await.map_err(|e| e.to_string())?;

        for snapshot in &self.script.snapshots {
            tokio::time::sleep(self.script.interval).await;
            if framed.send(Payload::Snapshot(snapshot.clone())).await.is_err() {
                // Client went away mid-script.
                self.recorded().hangups += 1;
                return Ok(());
            }
        }

        match self.script.ending {
            StreamEnding::Close => framed.get_mut().shutdown().await.map_err(|e| e.to_string()),
            StreamEnding::Abort => {
                let mut frame = bytes_of(Payload::Snapshot(Snapshot::at_turn(u32::MAX)))?;
                frame.truncate(frame.len() / 2);
                let socket = framed.get_mut();
                socket.write_all(&frame).await.map_err(|e| e.to_string())?;
                socket.shutdown().await.map_err(|e| e.to_string())
            },
            StreamEnding::HoldOpen => {
                while let Some(Ok(_)) = framed.next().await {}
                tracing::debug!("client closed snapshot stream");
                self.recorded().hangups += 1;
                Ok(())
            },
        }
    }
}

fn bytes_of(payload: Payload) -> Result<Vec<u8>, String> {
    let mut buf = BytesMut::new();
    PayloadCodec::new().encode(payload, &mut buf).map_err(|e| e.to_string())?;
    Ok(buf.to_vec())
}
