//! A seated connection as the room layer sees it.

use tandem_protocol::{ConnectionId, ServerEvent};
use tokio::sync::mpsc;

/// Channel for delivering outbound events to one connection.
///
/// Unbounded so a room actor never waits on a slow client: the
/// connection's writer task drains it at whatever pace the socket allows.
pub type MemberSender = mpsc::UnboundedSender<ServerEvent>;

/// A connection's identity plus the mailbox its writer task drains.
#[derive(Debug, Clone)]
pub struct Member {
    id: ConnectionId,
    outbox: MemberSender,
}

impl Member {
    pub fn new(id: ConnectionId, outbox: MemberSender) -> Self {
        Self { id, outbox }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Queues an event for this connection.
    ///
    /// Returns `false` if the connection's writer is gone. Callers
    /// broadcasting to a room ignore that and move on to the next member.
    pub fn send(&self, event: ServerEvent) -> bool {
        self.outbox.send(event).is_ok()
    }
}
