//! Length-delimited frame codec.
//!
//! Wraps [`LengthDelimitedCodec`] (4-byte big-endian length prefix) and
//! converts frame bodies to and from [`Payload`] values, so transports can
//! be driven through `FramedRead` / `FramedWrite`.

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder, LengthDelimitedCodec};

use crate::{errors::ProtocolError, payload::Payload};

/// Largest frame body accepted in either direction (16 MiB).
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Codec turning a byte stream into a stream of [`Payload`] values.
#[derive(Debug)]
pub struct PayloadCodec {
    frames: LengthDelimitedCodec,
}

impl PayloadCodec {
    /// Codec with the default [`MAX_FRAME_SIZE`] limit.
    pub fn new() -> Self {
        Self::with_max_frame_size(MAX_FRAME_SIZE)
    }

    /// Codec with a custom frame size limit.
    pub fn with_max_frame_size(max: usize) -> Self {
        Self { frames: LengthDelimitedCodec::builder().max_frame_length(max).new_codec() }
    }
}

impl Default for PayloadCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for PayloadCodec {
    type Item = Payload;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Payload>, ProtocolError> {
        match self.frames.decode(src)? {
            Some(frame) => Payload::decode(&frame).map(Some),
            None => Ok(None),
        }
    }
}

impl Encoder<Payload> for PayloadCodec {
    type Error = ProtocolError;

    fn encode(&mut self, item: Payload, dst: &mut BytesMut) -> Result<(), ProtocolError> {
        let body = item.encode()?;
        let max = self.frames.max_frame_length();
        if body.len() > max {
            return Err(ProtocolError::FrameTooLarge { size: body.len(), max });
        }
        self.frames.encode(body, dst)?;
        Ok(())
    }
}
