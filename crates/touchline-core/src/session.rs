//! Session state and the turn-consumption loop.
//!
//! A [`Session`] owns everything one participant needs for a match: the
//! transport connection, the authority service handle, the snapshot stream,
//! the lifetime token, and the sender builder. No state is global, so several
//! sessions can coexist in one process.
//!
//! # Turn loop
//!
//! [`Session::on_new_turn`] moves the snapshot stream into a spawned task that
//! repeats:
//!
//! ```text
//! ┌─────────────────────┐ cancelled ┌──────┐
//! │ select(lifetime,    │──────────▶│ exit │
//! │        stream.recv) │           └──────┘
//! └─────────────────────┘                ▲
//!    │ snapshot        │ closed / error  │
//!    ▼                 └── cancel ───────┘
//! build sender ──▶ await decide(snapshot, sender) ──▶ (loop)
//! ```
//!
//! The decision maker is awaited before the next receive, so at most one
//! decision runs at a time and a slow decision delays later snapshots rather
//! than queuing them. The receive is the only point where cancellation is
//! observed.

use std::{
    future::Future,
    sync::{
        Arc, Mutex, PoisonError, RwLock,
        atomic::{AtomicBool, Ordering},
    },
};

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use touchline_proto::Snapshot;

use crate::{
    error::SessionError,
    logger::Logger,
    sender::{OrderSender, SenderBuilder, default_builder},
    service::{GameService, SnapshotStream},
    transport::TransportConnection,
};

/// Decision logic invoked once per received snapshot.
#[async_trait]
pub trait DecisionMaker: Send + 'static {
    /// Decide what to do this turn. May send orders through `sender` now, or
    /// move it elsewhere and send later.
    async fn decide(&mut self, snapshot: Arc<Snapshot>, sender: Box<dyn OrderSender>);
}

/// [`DecisionMaker`] backed by a closure returning a future.
pub struct DecisionFn<F>(F);

/// Turn a closure into a [`DecisionMaker`].
///
/// ```ignore
/// session.on_new_turn(
///     decision_fn(|snapshot, sender| async move {
///         let _ = sender.send(&ctx, vec![PlayerAction::Catch], "catch").await;
///     }),
///     logger,
/// )?;
/// ```
pub fn decision_fn<F, Fut>(f: F) -> DecisionFn<F>
where
    F: FnMut(Arc<Snapshot>, Box<dyn OrderSender>) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    DecisionFn(f)
}

#[async_trait]
impl<F, Fut> DecisionMaker for DecisionFn<F>
where
    F: FnMut(Arc<Snapshot>, Box<dyn OrderSender>) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    async fn decide(&mut self, snapshot: Arc<Snapshot>, sender: Box<dyn OrderSender>) {
        (self.0)(snapshot, sender).await;
    }
}

/// One participant's session with the match authority.
pub struct Session<C: TransportConnection> {
    connection: Arc<C>,
    service: Arc<dyn GameService>,
    stream: Mutex<Option<Box<dyn SnapshotStream>>>,
    lifetime: CancellationToken,
    sender_builder: Arc<RwLock<SenderBuilder>>,
    closed: AtomicBool,
}

impl<C: TransportConnection> Session<C> {
    /// Assemble a session from an established connection and stream.
    ///
    /// [`Session::create`] is the usual entry point; this is the seam for
    /// custom handshakes. Senders default to [`default_builder`] over
    /// `service`.
    pub fn from_parts(
        connection: Arc<C>,
        service: Arc<dyn GameService>,
        stream: Box<dyn SnapshotStream>,
        lifetime: CancellationToken,
    ) -> Self {
        let builder = default_builder(Arc::clone(&service));
        Self {
            connection,
            service,
            stream: Mutex::new(Some(stream)),
            lifetime,
            sender_builder: Arc::new(RwLock::new(builder)),
            closed: AtomicBool::new(false),
        }
    }

    /// Start the turn loop on a new task and return immediately.
    ///
    /// The loop runs until the lifetime is cancelled or the snapshot stream
    /// ends. Stream closure is logged at info level, other stream failures at
    /// error level; both cancel the lifetime. Nothing is retried.
    ///
    /// Once the session has been stopped the returned task finishes without
    /// running any turn.
    ///
    /// # Errors
    ///
    /// [`SessionError::LoopAlreadyStarted`] if a loop already took the stream.
    pub fn on_new_turn<D: DecisionMaker>(
        &self,
        decision_maker: D,
        logger: Arc<dyn Logger>,
    ) -> Result<JoinHandle<()>, SessionError> {
        if self.closed.load(Ordering::SeqCst) {
            logger.debug("session already stopped, turn loop not started");
            return Ok(tokio::spawn(async {}));
        }
        let stream = self
            .stream
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or(SessionError::LoopAlreadyStarted)?;

        let turn_loop = TurnLoop {
            stream,
            decision_maker,
            sender_builder: Arc::clone(&self.sender_builder),
            lifetime: self.lifetime.clone(),
            logger,
        };
        Ok(tokio::spawn(turn_loop.run()))
    }

    /// Replace the factory used to build senders for future snapshots.
    ///
    /// Senders already handed to decision logic keep their original binding.
    pub fn set_sender_builder<F>(&self, builder: F)
    where
        F: Fn(Arc<Snapshot>, Arc<dyn Logger>) -> Box<dyn OrderSender> + Send + Sync + 'static,
    {
        let builder: SenderBuilder = Arc::new(builder);
        *self.sender_builder.write().unwrap_or_else(PoisonError::into_inner) = builder;
    }

    /// Raw transport connection.
    pub fn connection(&self) -> &Arc<C> {
        &self.connection
    }

    /// Authority service handle, for calls outside the turn loop.
    pub fn service(&self) -> &Arc<dyn GameService> {
        &self.service
    }

    /// Session lifetime token. Cancelled by [`Session::stop`] and when the
    /// snapshot stream ends.
    pub fn lifetime(&self) -> CancellationToken {
        self.lifetime.clone()
    }

    /// Cancel the lifetime and close the connection.
    ///
    /// Closing the connection tears down every stream opened on it: the
    /// snapshot stream (whether or not a loop ever took it, and even while a
    /// decision is running) and order sends still waiting for a reply.
    ///
    /// Safe to call any number of times, including after the loop exited on
    /// its own; only the first call closes the connection. Does not wait for
    /// the loop to observe cancellation.
    pub fn stop(&self) -> Result<(), SessionError> {
        self.lifetime.cancel();
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        // Drop a stream no loop has taken yet.
        drop(self.stream.lock().unwrap_or_else(PoisonError::into_inner).take());
        self.connection.close(0, "session stopped").map_err(SessionError::Close)
    }
}

/// State moved into the turn loop task.
struct TurnLoop<D> {
    stream: Box<dyn SnapshotStream>,
    decision_maker: D,
    sender_builder: Arc<RwLock<SenderBuilder>>,
    lifetime: CancellationToken,
    logger: Arc<dyn Logger>,
}

impl<D: DecisionMaker> TurnLoop<D> {
    async fn run(mut self) {
        loop {
            let received = tokio::select! {
                biased;
                () = self.lifetime.cancelled() => {
                    self.logger.debug("session lifetime cancelled, leaving turn loop");
                    return;
                }
                received = self.stream.recv() => received,
            };

            match received {
                Ok(snapshot) => self.play_turn(snapshot).await,
                Err(SessionError::StreamClosed) => {
                    self.logger.info("snapshot stream closed by authority");
                    self.lifetime.cancel();
                    return;
                },
                Err(err) => {
                    self.logger.error(&err.to_string());
                    self.lifetime.cancel();
                    return;
                },
            }
        }
    }

    async fn play_turn(&mut self, snapshot: Snapshot) {
        let snapshot = Arc::new(snapshot);
        // Clone the builder out so the lock is not held across the decision.
        let build = Arc::clone(&*self.sender_builder.read().unwrap_or_else(PoisonError::into_inner));
        let sender = build(Arc::clone(&snapshot), Arc::clone(&self.logger));

        self.logger.debug(&format!("calling decision maker for turn {}", snapshot.turn));
        self.decision_maker.decide(snapshot, sender).await;
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::atomic::{AtomicUsize, Ordering},
        time::Duration,
    };

    use tokio::sync::mpsc;
    use touchline_proto::{OrderResponse, PlayerAction};

    use super::*;
    use crate::{
        logger::{LogLevel, RecordingLogger},
        testing::{ChannelStream, DuplexConnection, RecordingService},
    };

    type Feed = mpsc::UnboundedSender<Result<Snapshot, SessionError>>;

    fn session() -> (Arc<Session<DuplexConnection>>, Feed, Arc<RecordingService>) {
        let (connection, _accepted) = DuplexConnection::new();
        let (stream, feed) = ChannelStream::new();
        let service = Arc::new(RecordingService::default());
        let session = Session::from_parts(
            Arc::new(connection),
            service.clone(),
            Box::new(stream),
            CancellationToken::new(),
        );
        (Arc::new(session), feed, service)
    }

    /// Decision maker recording every turn it sees.
    fn recording_decider(turns: Arc<Mutex<Vec<u32>>>) -> impl DecisionMaker {
        decision_fn(move |snapshot: Arc<Snapshot>, _sender| {
            let turns = Arc::clone(&turns);
            async move {
                turns.lock().unwrap().push(snapshot.turn);
            }
        })
    }

    #[tokio::test]
    async fn delivers_every_snapshot_in_order() {
        let (session, feed, _service) = session();
        let turns = Arc::new(Mutex::new(Vec::new()));
        let logger = Arc::new(RecordingLogger::new());

        let handle = session.on_new_turn(recording_decider(turns.clone()), logger.clone()).unwrap();
        for turn in [1, 2, 2, 3, 5, 8] {
            feed.send(Ok(Snapshot::at_turn(turn))).unwrap();
        }
        drop(feed);
        handle.await.unwrap();

        assert_eq!(*turns.lock().unwrap(), vec![1, 2, 2, 3, 5, 8]);
        assert!(session.lifetime().is_cancelled());
        assert_eq!(
            logger.messages_at(LogLevel::Debug).first().map(String::as_str),
            Some("calling decision maker for turn 1")
        );
    }

    #[tokio::test]
    async fn decisions_never_overlap() {
        let (session, feed, _service) = session();
        let in_flight = Arc::new(AtomicUsize::new(0));
        let max_in_flight = Arc::new(AtomicUsize::new(0));

        let decider = {
            let in_flight = in_flight.clone();
            let max_in_flight = max_in_flight.clone();
            decision_fn(move |_snapshot, _sender| {
                let in_flight = in_flight.clone();
                let max_in_flight = max_in_flight.clone();
                async move {
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    max_in_flight.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                }
            })
        };

        let handle = session.on_new_turn(decider, Arc::new(RecordingLogger::new())).unwrap();
        for turn in 1..=10 {
            feed.send(Ok(Snapshot::at_turn(turn))).unwrap();
        }
        drop(feed);
        handle.await.unwrap();

        assert_eq!(max_in_flight.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn stop_before_first_snapshot_runs_no_turns() {
        let (session, feed, _service) = session();
        let turns = Arc::new(Mutex::new(Vec::new()));

        let handle = session
            .on_new_turn(recording_decider(turns.clone()), Arc::new(RecordingLogger::new()))
            .unwrap();
        session.stop().unwrap();
        handle.await.unwrap();

        // Snapshots arriving after stop are never consumed.
        let _ = feed.send(Ok(Snapshot::at_turn(1)));
        assert!(turns.lock().unwrap().is_empty());
        assert!(session.lifetime().is_cancelled());
        assert_eq!(session.connection().close_calls(), 1);
    }

    #[tokio::test]
    async fn stop_is_idempotent() {
        let (session, _feed, _service) = session();

        session.stop().unwrap();
        session.stop().unwrap();

        assert!(session.lifetime().is_cancelled());
        assert_eq!(session.connection().close_calls(), 1);
    }

    #[tokio::test]
    async fn loop_started_after_stop_runs_no_turns() {
        let (session, feed, _service) = session();
        let turns = Arc::new(Mutex::new(Vec::new()));

        session.stop().unwrap();
        // The untaken stream was dropped with the stop.
        assert!(feed.send(Ok(Snapshot::at_turn(1))).is_err());

        let handle = session
            .on_new_turn(recording_decider(turns.clone()), Arc::new(RecordingLogger::new()))
            .unwrap();
        handle.await.unwrap();
        assert!(turns.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn stop_after_stream_failure_still_closes_once() {
        let (session, feed, _service) = session();
        let handle = session
            .on_new_turn(decision_fn(|_s, _o| async {}), Arc::new(RecordingLogger::new()))
            .unwrap();

        feed.send(Err(SessionError::Stream("reset".into()))).unwrap();
        handle.await.unwrap();
        assert!(session.lifetime().is_cancelled());

        session.stop().unwrap();
        session.stop().unwrap();
        assert_eq!(session.connection().close_calls(), 1);
    }

    #[tokio::test]
    async fn clean_close_cancels_lifetime_and_ignores_later_snapshots() {
        let (session, feed, _service) = session();
        let turns = Arc::new(Mutex::new(Vec::new()));
        let logger = Arc::new(RecordingLogger::new());

        feed.send(Ok(Snapshot::at_turn(1))).unwrap();
        feed.send(Err(SessionError::StreamClosed)).unwrap();
        feed.send(Ok(Snapshot::at_turn(2))).unwrap();

        let handle = session.on_new_turn(recording_decider(turns.clone()), logger.clone()).unwrap();
        handle.await.unwrap();

        assert_eq!(*turns.lock().unwrap(), vec![1]);
        assert!(session.lifetime().is_cancelled());
        assert_eq!(logger.messages_at(LogLevel::Info), vec!["snapshot stream closed by authority"]);
        assert!(logger.messages_at(LogLevel::Error).is_empty());
        // Stream end does not close the connection; only stop does.
        assert_eq!(session.connection().close_calls(), 0);
    }

    #[tokio::test]
    async fn stream_error_is_logged_and_cancels_lifetime() {
        let (session, feed, _service) = session();
        let logger = Arc::new(RecordingLogger::new());

        feed.send(Err(SessionError::Stream("connection reset".into()))).unwrap();
        let handle =
            session.on_new_turn(decision_fn(|_s, _o| async {}), logger.clone()).unwrap();
        handle.await.unwrap();

        assert!(session.lifetime().is_cancelled());
        assert_eq!(
            logger.messages_at(LogLevel::Error),
            vec!["snapshot stream error: connection reset"]
        );
        assert!(logger.messages_at(LogLevel::Info).is_empty());
    }

    #[tokio::test]
    async fn second_loop_is_rejected() {
        let (session, _feed, _service) = session();
        let logger: Arc<dyn Logger> = Arc::new(RecordingLogger::new());

        let _handle = session.on_new_turn(decision_fn(|_s, _o| async {}), logger.clone()).unwrap();
        let second = session.on_new_turn(decision_fn(|_s, _o| async {}), logger);
        assert!(matches!(second, Err(SessionError::LoopAlreadyStarted)));
        session.stop().unwrap();
    }

    #[tokio::test]
    async fn default_sender_transmits_through_service() {
        let (session, feed, service) = session();
        let ctx = CancellationToken::new();

        let decider = decision_fn(move |_snapshot, sender: Box<dyn OrderSender>| {
            let ctx = ctx.clone();
            async move {
                sender.send(&ctx, vec![PlayerAction::Catch], "catch").await.unwrap();
            }
        });
        let handle = session.on_new_turn(decider, Arc::new(RecordingLogger::new())).unwrap();
        feed.send(Ok(Snapshot::at_turn(4))).unwrap();
        drop(feed);
        handle.await.unwrap();

        let sent = service.orders();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].turn, 4);
    }

    /// Sender that answers with a fixed tag instead of talking to anyone.
    struct TaggedSender {
        tag: &'static str,
        turn: u32,
    }

    #[async_trait]
    impl OrderSender for TaggedSender {
        fn turn(&self) -> u32 {
            self.turn
        }

        async fn send(
            &self,
            _ctx: &CancellationToken,
            _orders: Vec<PlayerAction>,
            _debug_message: &str,
        ) -> Result<OrderResponse, SessionError> {
            Ok(OrderResponse::success(self.tag))
        }
    }

    fn tagged(tag: &'static str) -> impl Fn(Arc<Snapshot>, Arc<dyn Logger>) -> Box<dyn OrderSender> {
        move |snapshot: Arc<Snapshot>, _logger: Arc<dyn Logger>| -> Box<dyn OrderSender> {
            Box::new(TaggedSender { tag, turn: snapshot.turn })
        }
    }

    #[tokio::test]
    async fn replaced_builder_applies_from_next_turn() {
        let (session, feed, _service) = session();
        session.set_sender_builder(tagged("first"));
        let seen = Arc::new(Mutex::new(Vec::new()));

        let decider = {
            let session = Arc::clone(&session);
            let seen = seen.clone();
            decision_fn(move |snapshot: Arc<Snapshot>, sender: Box<dyn OrderSender>| {
                let session = Arc::clone(&session);
                let seen = seen.clone();
                async move {
                    if snapshot.turn == 1 {
                        // Swap mid-turn: this turn's sender must keep its binding.
                        session.set_sender_builder(tagged("second"));
                    }
                    let response =
                        sender.send(&CancellationToken::new(), vec![], "tagged").await.unwrap();
                    seen.lock().unwrap().push((sender.turn(), response.details));
                }
            })
        };

        let handle = session.on_new_turn(decider, Arc::new(RecordingLogger::new())).unwrap();
        feed.send(Ok(Snapshot::at_turn(1))).unwrap();
        feed.send(Ok(Snapshot::at_turn(2))).unwrap();
        drop(feed);
        handle.await.unwrap();

        assert_eq!(
            *seen.lock().unwrap(),
            vec![(1, "first".to_string()), (2, "second".to_string())]
        );
    }

    #[tokio::test]
    async fn sender_can_be_moved_off_the_loop() {
        let (session, feed, service) = session();
        let (done_tx, mut done_rx) = mpsc::unbounded_channel();

        let decider = decision_fn(move |_snapshot, sender: Box<dyn OrderSender>| {
            let done_tx = done_tx.clone();
            async move {
                tokio::spawn(async move {
                    let result =
                        sender.send(&CancellationToken::new(), vec![PlayerAction::Catch], "bg").await;
                    let _ = done_tx.send(result.is_ok());
                });
            }
        });

        let _handle = session.on_new_turn(decider, Arc::new(RecordingLogger::new())).unwrap();
        feed.send(Ok(Snapshot::at_turn(9))).unwrap();

        assert_eq!(done_rx.recv().await, Some(true));
        assert_eq!(service.orders()[0].turn, 9);
        session.stop().unwrap();
    }
}
