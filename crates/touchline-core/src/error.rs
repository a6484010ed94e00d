//! Session error types.

use std::io;

use thiserror::Error;

/// Errors surfaced by session creation, the turn loop, and order submission.
///
/// Creation-time variants (`Connection`, `Handshake`) are returned to the
/// caller of [`crate::Session::create`]. Loop-time variants (`StreamClosed`,
/// `Stream`) never leave the loop task: they are logged and turned into
/// lifetime cancellation. Send-time variants (`Transmission`, `Cancelled`)
/// are returned to whoever called [`crate::OrderSender::send`].
#[derive(Debug, Error)]
pub enum SessionError {
    /// Dialing the authority failed.
    #[error("failed to connect to authority at {addr}: {source}")]
    Connection {
        /// Address that was dialed.
        addr: String,
        /// Underlying transport error.
        #[source]
        source: io::Error,
    },

    /// Authority refused the join, or the join exchange broke down.
    #[error("join handshake failed: {reason}")]
    Handshake {
        /// Rejection reason or failure description.
        reason: String,
    },

    /// Authority ended the snapshot stream cleanly.
    #[error("snapshot stream closed by authority")]
    StreamClosed,

    /// Snapshot stream failed for any other reason.
    #[error("snapshot stream error: {0}")]
    Stream(String),

    /// Order set could not be delivered or the authority answered with an
    /// error.
    #[error("failed to transmit orders for turn {turn}: {reason}")]
    Transmission {
        /// Turn the order set was stamped with.
        turn: u32,
        /// Failure description.
        reason: String,
    },

    /// Caller-supplied context was cancelled before the operation finished.
    #[error("operation cancelled")]
    Cancelled,

    /// The turn loop already owns the snapshot stream.
    #[error("turn loop already started for this session")]
    LoopAlreadyStarted,

    /// Closing the connection failed.
    #[error("failed to close connection: {0}")]
    Close(#[source] io::Error),
}
