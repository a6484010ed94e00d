//! Protocol error types.

use std::io;

use thiserror::Error;

/// Result alias for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors raised while encoding or decoding wire frames.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Payload could not be serialized to CBOR.
    #[error("failed to encode payload: {0}")]
    Encode(String),

    /// Frame body is not a valid CBOR payload.
    #[error("failed to decode payload: {0}")]
    Decode(String),

    /// Encoded payload exceeds the frame size limit.
    #[error("frame of {size} bytes exceeds limit of {max} bytes")]
    FrameTooLarge {
        /// Size of the rejected frame.
        size: usize,
        /// Configured limit.
        max: usize,
    },

    /// Underlying stream or framing failure (truncated frame, bad length).
    #[error("frame i/o error: {0}")]
    Io(#[from] io::Error),
}
