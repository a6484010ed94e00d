//! Payload envelope carried inside each frame.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::{
    errors::{ProtocolError, Result},
    messages::{JoinRequest, OrderResponse, OrderSet, Snapshot},
};

/// Every message that can appear on a Touchline stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Payload {
    /// Client asks to join a team.
    Join(JoinRequest),
    /// Authority accepted the join; snapshots follow on the same stream.
    Joined,
    /// Authority refused the join.
    Rejected {
        /// Why the join was refused.
        reason: String,
    },
    /// World state for one turn.
    Snapshot(Snapshot),
    /// Orders submitted for one turn.
    Orders(OrderSet),
    /// Authority verdict on an order set.
    OrderResponse(OrderResponse),
    /// Authority-side failure that is not tied to a specific request type.
    Error {
        /// Error description.
        reason: String,
    },
}

impl Payload {
    /// Serialize to CBOR.
    pub fn encode(&self) -> Result<Bytes> {
        let mut buf = Vec::new();
        ciborium::ser::into_writer(self, &mut buf)
            .map_err(|e| ProtocolError::Encode(e.to_string()))?;
        Ok(Bytes::from(buf))
    }

    /// Deserialize from a CBOR frame body.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        ciborium::de::from_reader(bytes).map_err(|e| ProtocolError::Decode(e.to_string()))
    }

    /// Short name of the variant, for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Join(_) => "Join",
            Self::Joined => "Joined",
            Self::Rejected { .. } => "Rejected",
            Self::Snapshot(_) => "Snapshot",
            Self::Orders(_) => "Orders",
            Self::OrderResponse(_) => "OrderResponse",
            Self::Error { .. } => "Error",
        }
    }
}
