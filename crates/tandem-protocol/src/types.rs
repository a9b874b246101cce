//! Core protocol types for Tandem's wire format.
//!
//! Every type here is serialized to a frame, sent over a connection, and
//! deserialized on the other side. Inbound frames decode into
//! [`ClientEvent`]; everything the coordinator emits is a [`ServerEvent`].

use std::fmt;

use serde::{Deserialize, Serialize};
use tandem_transport::ConnectionId;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// The caller-supplied key that groups two connections into one room.
///
/// Opaque to the coordinator: it has no required format, and the external
/// room-metadata store remains the source of truth for anything richer
/// (display name, player records). Serialized as the bare string.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct RoomKey(pub String);

impl RoomKey {
    /// Returns the key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RoomKey {
    fn from(key: &str) -> Self {
        Self(key.to_owned())
    }
}

impl From<String> for RoomKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

/// A mark on the board. Serialized as `"X"` or `"O"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Symbol {
    X,
    O,
}

impl Symbol {
    /// The symbol that moves after this one.
    pub fn other(self) -> Self {
        match self {
            Self::X => Self::O,
            Self::O => Self::X,
        }
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::X => f.write_str("X"),
            Self::O => f.write_str("O"),
        }
    }
}

/// Index of a board cell, row-major, `0..=8` on a legal board.
///
/// The relay path forwards whatever the client sent; only validated moves
/// check the range.
pub type CellIndex = u8;

// ---------------------------------------------------------------------------
// Moves
// ---------------------------------------------------------------------------

/// A move as sent by a client: which room, which cell, which mark.
///
/// Fields other than these three are ignored on decode and never relayed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveRequest {
    pub room_key: RoomKey,
    pub cell_index: CellIndex,
    pub symbol: Symbol,
}

impl MoveRequest {
    /// Splits the request into its routing key and the relayed payload.
    pub fn into_parts(self) -> (RoomKey, MovePayload) {
        (
            self.room_key,
            MovePayload {
                cell_index: self.cell_index,
                symbol: self.symbol,
            },
        )
    }
}

/// The part of a move that is relayed to room members, unmodified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovePayload {
    pub cell_index: CellIndex,
    pub symbol: Symbol,
}

// ---------------------------------------------------------------------------
// ClientEvent — inbound
// ---------------------------------------------------------------------------

/// Events a client sends to the coordinator.
///
/// Adjacently tagged, so `ClientEvent::JoinGame("r1".into())` is
/// `{"event":"joinGame","data":"r1"}` and `LeaveGame` is just
/// `{"event":"leaveGame"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ClientEvent {
    /// Take a seat in the room with this key, creating it if needed.
    JoinGame(RoomKey),

    /// Relay a move to every member of the room, unchecked.
    Move(MoveRequest),

    /// Apply a move against the room's board, rejecting illegal ones.
    ValidatedMove(MoveRequest),

    /// Tell every member of the room to clear their board.
    ResetGame(RoomKey),

    /// Give up the current seat without closing the connection.
    LeaveGame,
}

// ---------------------------------------------------------------------------
// ServerEvent — outbound
// ---------------------------------------------------------------------------

/// Why a request was refused. Serialized in camelCase (`"roomFull"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorReason {
    /// The room already has both seats taken.
    RoomFull,
    /// No room is tracked under that key.
    UnknownRoom,
    /// The requester does not hold a seat in that room.
    NotMember,
    /// The requester already holds a seat in another room.
    AlreadyInRoom,
    /// A validated move broke the rules of the board.
    IllegalMove,
}

/// Events the coordinator sends to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum ServerEvent {
    /// Sent to a connection once it holds a seat.
    GameJoined { room_key: RoomKey },

    /// Sent to the first member when the second seat is taken.
    MemberJoined { connection_id: ConnectionId },

    /// A relayed move, delivered to every member including the mover.
    Move(MovePayload),

    /// Every member should clear their board.
    ResetGame,

    /// Sent to the remaining member when the other one leaves.
    MemberLeft { connection_id: ConnectionId },

    /// The room was closed under the member, e.g. by the idle sweep.
    RoomClosed { room_key: RoomKey, reason: String },

    /// A request from this connection was refused.
    Error { reason: ErrorReason, message: String },
}
