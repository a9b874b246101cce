//! Error types for the room layer.

use tandem_protocol::{ConnectionId, ErrorReason, RoomKey};

use crate::MoveRejection;

/// Errors that can occur during room operations.
///
/// All of them are reported to the requesting connection only; none of
/// them changes another member's view of the room.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// Both seats are taken by other connections.
    #[error("room {0} is full")]
    RoomFull(RoomKey),

    /// No room is tracked under the key.
    #[error("room {0} is not open")]
    UnknownRoom(RoomKey),

    /// The connection holds no seat in the room.
    #[error("{0} is not a member of room {1}")]
    NotMember(ConnectionId, RoomKey),

    /// The connection already holds a seat somewhere else.
    #[error("{0} is already in room {1}")]
    AlreadyInRoom(ConnectionId, RoomKey),

    /// A validated move was refused by the board.
    #[error("illegal move: {0}")]
    IllegalMove(#[from] MoveRejection),

    /// The room's actor stopped before it could answer.
    #[error("room {0} is unavailable")]
    Unavailable(RoomKey),
}

impl RoomError {
    /// The reason code sent to the client in an `error` event.
    ///
    /// An actor that stopped mid-request is indistinguishable, from the
    /// client's side, from a room that was never there.
    pub fn reason(&self) -> ErrorReason {
        match self {
            Self::RoomFull(_) => ErrorReason::RoomFull,
            Self::UnknownRoom(_) | Self::Unavailable(_) => {
                ErrorReason::UnknownRoom
            }
            Self::NotMember(..) => ErrorReason::NotMember,
            Self::AlreadyInRoom(..) => ErrorReason::AlreadyInRoom,
            Self::IllegalMove(_) => ErrorReason::IllegalMove,
        }
    }
}
