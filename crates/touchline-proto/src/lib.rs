//! Wire format for the Touchline session protocol.
//!
//! Every message exchanged with the match authority is a [`Payload`] encoded
//! as CBOR and carried in a length-delimited frame (4-byte big-endian length
//! prefix followed by the CBOR body).
//!
//! The session layer only cares about a handful of fields (the turn number of
//! a [`Snapshot`], the acceptance code of an [`OrderResponse`]); everything
//! else is authority-defined state that is passed through untouched.
//!
//! # Security
//!
//! Frames larger than [`MAX_FRAME_SIZE`] are rejected on both encode and
//! decode so a misbehaving peer cannot make us buffer unbounded input.
#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod codec;
pub mod errors;
pub mod messages;
pub mod payload;

pub use codec::{MAX_FRAME_SIZE, PayloadCodec};
pub use errors::{ProtocolError, Result};
pub use messages::{
    JoinRequest, MatchState, Order, OrderResponse, OrderSet, PlayerAction, PlayerPosition, Point,
    ResponseCode, Snapshot, TeamSide, Vector,
};
pub use payload::Payload;
