//! Touchline session layer
//!
//! Turns a reliable, ordered transport into a turn-driven match session: join
//! a team, receive one snapshot per turn, hand each snapshot to caller-supplied
//! decision logic, and let that logic submit orders back to the authority.
//!
//! # Architecture
//!
//! The session is split along the same seams as the protocol itself:
//!
//! - the transport moves bytes and knows nothing about turns
//! - the authority service handle speaks the request/response protocol on
//!   top of transport streams
//! - the session owns the snapshot stream and runs a single turn loop task,
//!   gated by one cancellable lifetime token
//!
//! Decision logic is awaited on the loop task, so a slow decision delays the
//! next receive instead of buffering snapshots. Callers that want overlap move
//! the per-turn [`OrderSender`] into their own task.
//!
//! # Components
//!
//! - [`transport`]: Transport abstraction (connections, bidirectional streams)
//! - [`config`]: Session configuration and environment loading
//! - [`service`]: Authority service handle and snapshot stream
//! - [`sender`]: Per-turn order sender and sender builders
//! - [`session`]: Session state and the turn-consumption loop
//! - [`lifecycle`]: Session creation (handshake) and shutdown
//! - [`logger`]: Logger contract used by the turn loop
//! - [`error`]: Session error types

pub mod config;
pub mod error;
pub mod lifecycle;
pub mod logger;
pub mod sender;
pub mod service;
pub mod session;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{ConfigError, PROTOCOL_VERSION, SecurityMode, SessionConfig};
pub use error::SessionError;
pub use logger::{LogLevel, Logger, RecordingLogger, TracingLogger};
pub use sender::{OrderSender, SenderBuilder, ServiceSender, build_order_set, default_builder};
pub use service::{FramedSnapshotStream, GameService, RemoteGame, SnapshotStream};
pub use session::{DecisionFn, DecisionMaker, Session, decision_fn};
pub use tokio_util::sync::CancellationToken;
pub use transport::{RELAY_BUFFER, Transport, TransportConnection, relay};
