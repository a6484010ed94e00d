//! Per-turn order sender.
//!
//! The turn loop builds exactly one [`OrderSender`] per snapshot and hands it
//! to the decision logic. The sender is bound to that snapshot's turn number:
//! every order set it transmits is stamped with it, no matter when `send` is
//! called. Senders are owned values, so decision logic may move them into a
//! separate task and answer after the next snapshot has already arrived.
//!
//! Repeated `send` calls within one turn produce independent order sets with
//! the same turn number. How the authority treats duplicates is its own
//! policy.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use touchline_proto::{Order, OrderResponse, OrderSet, PlayerAction, Snapshot};

use crate::{error::SessionError, logger::Logger, service::GameService};

/// Submits orders for the turn it was built for.
#[async_trait]
pub trait OrderSender: Send + Sync {
    /// Turn this sender stamps on every order set.
    fn turn(&self) -> u32;

    /// Build an order set from `orders` and `debug_message` and transmit it.
    ///
    /// Performs exactly one call to the authority. Returns the authority's
    /// response whatever its code, [`SessionError::Transmission`] when the
    /// call itself fails, or [`SessionError::Cancelled`] if `ctx` is
    /// cancelled first.
    async fn send(
        &self,
        ctx: &CancellationToken,
        orders: Vec<PlayerAction>,
        debug_message: &str,
    ) -> Result<OrderResponse, SessionError>;
}

/// Factory producing the sender for each new snapshot.
pub type SenderBuilder =
    Arc<dyn Fn(Arc<Snapshot>, Arc<dyn Logger>) -> Box<dyn OrderSender> + Send + Sync>;

/// Wrap each action in an [`Order`] envelope, preserving order.
pub fn build_order_set(turn: u32, orders: Vec<PlayerAction>, debug_message: &str) -> OrderSet {
    OrderSet {
        turn,
        debug_message: debug_message.to_string(),
        orders: orders.into_iter().map(|action| Order { action }).collect(),
    }
}

/// Builder producing [`ServiceSender`]s bound to `service`.
pub fn default_builder(service: Arc<dyn GameService>) -> SenderBuilder {
    Arc::new(move |snapshot, logger| {
        Box::new(ServiceSender::new(snapshot, logger, Arc::clone(&service)))
    })
}

/// Default sender: transmits through the session's [`GameService`].
pub struct ServiceSender {
    snapshot: Arc<Snapshot>,
    logger: Arc<dyn Logger>,
    service: Arc<dyn GameService>,
}

impl ServiceSender {
    /// Sender bound to `snapshot`.
    pub fn new(
        snapshot: Arc<Snapshot>,
        logger: Arc<dyn Logger>,
        service: Arc<dyn GameService>,
    ) -> Self {
        Self { snapshot, logger, service }
    }

    /// Snapshot this sender is bound to.
    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }
}

#[async_trait]
impl OrderSender for ServiceSender {
    fn turn(&self) -> u32 {
        self.snapshot.turn
    }

    async fn send(
        &self,
        ctx: &CancellationToken,
        orders: Vec<PlayerAction>,
        debug_message: &str,
    ) -> Result<OrderResponse, SessionError> {
        let order_set = build_order_set(self.snapshot.turn, orders, debug_message);
        self.logger.debug(&format!("sending orders for turn {}", order_set.turn));

        tokio::select! {
            biased;
            () = ctx.cancelled() => Err(SessionError::Cancelled),
            response = self.service.send_orders(order_set) => response,
        }
    }
}
