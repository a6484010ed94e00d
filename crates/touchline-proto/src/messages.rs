//! Message bodies exchanged with the match authority.
//!
//! # Protocol Flow
//!
//! 1. Client sends [`JoinRequest`] on a fresh stream
//! 2. Authority answers `Joined` (or `Rejected`) and keeps the stream open
//! 3. Authority pushes one [`Snapshot`] per turn on that stream
//! 4. For any turn, the client may send an [`OrderSet`] on a separate stream
//!    and receives one [`OrderResponse`]

use serde::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr, Serialize_repr};

/// Integer position on the field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal coordinate.
    pub x: i32,
    /// Vertical coordinate.
    pub y: i32,
}

impl Point {
    /// Create a point from its coordinates.
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Direction vector used by movement and kick actions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vector {
    /// Horizontal component.
    pub x: f64,
    /// Vertical component.
    pub y: f64,
}

/// Side of the field a participant plays for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize_repr, Deserialize_repr)]
#[repr(u8)]
pub enum TeamSide {
    /// Home team.
    Home = 0,
    /// Away team.
    Away = 1,
}

/// Phase of the match as reported by the authority.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize_repr, Deserialize_repr)]
#[repr(u8)]
pub enum MatchState {
    /// Waiting for participants to join.
    #[default]
    Waiting = 0,
    /// All participants joined, match about to start.
    GetReady = 1,
    /// Authority is collecting orders for the current turn.
    Listening = 2,
    /// Authority is applying orders.
    Playing = 3,
    /// Kick-off reset after a goal.
    Shifting = 4,
    /// Match finished.
    Over = 5,
}

/// Request to join a team, sent once when the session is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinRequest {
    /// Participant token issued out of band.
    pub token: String,
    /// Participant (shirt) number.
    pub number: u32,
    /// Where the participant wants to start.
    pub init_position: Point,
    /// Team the participant plays for.
    pub team_side: TeamSide,
    /// Protocol version implemented by the client.
    pub protocol_version: String,
}

/// Position of one participant inside a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerPosition {
    /// Participant number.
    pub number: u32,
    /// Team the participant plays for.
    pub team_side: TeamSide,
    /// Current position.
    pub position: Point,
}

/// World state for a single turn.
///
/// The session layer only reads [`Snapshot::turn`]; the remaining fields are
/// authority-defined and handed to decision logic as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Turn number, non-decreasing over one stream.
    pub turn: u32,
    /// Match phase.
    pub state: MatchState,
    /// Ball position.
    pub ball: Point,
    /// Positions of every participant on the field.
    pub players: Vec<PlayerPosition>,
}

impl Snapshot {
    /// Snapshot for `turn` with the ball at the origin and no participants.
    pub fn at_turn(turn: u32) -> Self {
        Self { turn, state: MatchState::Listening, ball: Point::default(), players: Vec::new() }
    }
}

/// A single action a participant wants to apply during a turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PlayerAction {
    /// Run in a direction.
    Move {
        /// Heading.
        direction: Vector,
        /// Speed in field units per turn.
        speed: f64,
    },
    /// Kick the ball.
    Kick {
        /// Kick direction.
        direction: Vector,
        /// Ball speed after the kick.
        speed: f64,
    },
    /// Try to take possession of the ball.
    Catch,
    /// Goalkeeper jump towards a target.
    Jump {
        /// Where to land.
        target: Point,
        /// Jump speed.
        speed: f64,
    },
}

/// Envelope wrapping one action inside an [`OrderSet`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    /// Wrapped action.
    pub action: PlayerAction,
}

/// All orders a participant submits for one turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderSet {
    /// Turn the orders apply to.
    pub turn: u32,
    /// Free-form annotation shown in the authority's debug views.
    pub debug_message: String,
    /// Orders in submission order.
    pub orders: Vec<Order>,
}

/// Acceptance status for a submitted [`OrderSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize_repr, Deserialize_repr)]
#[repr(u8)]
pub enum ResponseCode {
    /// Orders accepted.
    Success = 0,
    /// Token or number does not match a joined participant.
    UnknownPlayer = 1,
    /// Authority is not collecting orders right now.
    NotListening = 2,
    /// Orders reference a turn other than the current one.
    WrongTurn = 3,
    /// Any other rejection.
    Other = 99,
}

/// Authority reply to an [`OrderSet`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderResponse {
    /// Acceptance status.
    pub code: ResponseCode,
    /// Human-readable detail.
    pub details: String,
}

impl OrderResponse {
    /// Successful response with the given detail.
    pub fn success(details: impl Into<String>) -> Self {
        Self { code: ResponseCode::Success, details: details.into() }
    }

    /// Whether the authority accepted the orders.
    pub fn is_success(&self) -> bool {
        self.code == ResponseCode::Success
    }
}
