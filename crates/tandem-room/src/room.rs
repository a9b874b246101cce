//! Room actor: an isolated Tokio task that owns one room's seats.
//!
//! Each room runs in its own task, communicating with the outside world
//! through an mpsc channel. Because a single task processes every command
//! for the room, the capacity check, the seat mutation and the broadcast
//! that follows are atomic with respect to each other, and every member
//! sees broadcasts in the order the room handled them.

use std::fmt;
use std::ops::ControlFlow;
use std::time::Duration;

use tandem_protocol::{ConnectionId, MovePayload, RoomKey, ServerEvent};
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;

use crate::{Board, Member, RoomError, RoomPhase, SEATS};

/// Identity of one room actor.
///
/// A key reused after its room was destroyed maps to a fresh actor with a
/// fresh id, which lets the registry tell the two apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RoomId(u64);

impl RoomId {
    pub(crate) fn new(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "room-{}", self.0)
    }
}

/// Commands sent to a room actor through its channel.
///
/// The `oneshot::Sender` in each variant is the reply channel: the caller
/// sends a command and waits for the answer on it.
pub(crate) enum RoomCommand {
    /// Seat a connection (or re-confirm its seat).
    Join {
        member: Member,
        reply: oneshot::Sender<Result<usize, RoomError>>,
    },

    /// Free a connection's seat. Replies with the remaining seat count,
    /// or `None` if the connection had no seat here.
    Leave {
        connection: ConnectionId,
        reply: oneshot::Sender<Option<usize>>,
    },

    /// Broadcast a move verbatim.
    Relay {
        sender: ConnectionId,
        payload: MovePayload,
        reply: oneshot::Sender<Result<(), RoomError>>,
    },

    /// Check a move against the board, then broadcast it.
    ValidatedMove {
        sender: ConnectionId,
        payload: MovePayload,
        reply: oneshot::Sender<Result<(), RoomError>>,
    },

    /// Clear the board and tell every member to do the same.
    Reset {
        sender: ConnectionId,
        reply: oneshot::Sender<Result<(), RoomError>>,
    },

    /// Snapshot the room's metadata.
    Info { reply: oneshot::Sender<RoomInfo> },

    /// Close the room if it is not Active and has been quiet for
    /// `max_idle`. Replies with the evicted connections when it closed.
    CloseIfIdle {
        max_idle: Duration,
        reply: oneshot::Sender<Option<Vec<ConnectionId>>>,
    },
}

/// A snapshot of room metadata.
#[derive(Debug, Clone)]
pub struct RoomInfo {
    /// The actor's id.
    pub id: RoomId,
    /// The key clients joined with.
    pub key: RoomKey,
    /// Current phase.
    pub phase: RoomPhase,
    /// Seated connections in join order.
    pub members: Vec<ConnectionId>,
    /// Time since the last successful command.
    pub idle_for: Duration,
}

/// Handle to a running room actor. Used to send commands to it.
///
/// Cheap to clone — it's an `mpsc::Sender` plus the room's identity.
#[derive(Clone)]
pub(crate) struct RoomHandle {
    id: RoomId,
    key: RoomKey,
    sender: mpsc::Sender<RoomCommand>,
}

impl RoomHandle {
    pub(crate) fn id(&self) -> RoomId {
        self.id
    }

    pub(crate) fn key(&self) -> &RoomKey {
        &self.key
    }

    /// Returns `true` once the actor has stopped.
    pub(crate) fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Sends a command built around a fresh reply channel and waits for
    /// the answer. A stopped actor surfaces as `Unavailable`.
    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> RoomCommand,
    ) -> Result<T, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(command(reply_tx))
            .await
            .map_err(|_| RoomError::Unavailable(self.key.clone()))?;
        reply_rx
            .await
            .map_err(|_| RoomError::Unavailable(self.key.clone()))
    }

    pub(crate) async fn join(
        &self,
        member: Member,
    ) -> Result<usize, RoomError> {
        self.request(|reply| RoomCommand::Join { member, reply })
            .await?
    }

    pub(crate) async fn leave(
        &self,
        connection: ConnectionId,
    ) -> Result<Option<usize>, RoomError> {
        self.request(|reply| RoomCommand::Leave { connection, reply })
            .await
    }

    pub(crate) async fn relay(
        &self,
        sender: ConnectionId,
        payload: MovePayload,
    ) -> Result<(), RoomError> {
        self.request(|reply| RoomCommand::Relay {
            sender,
            payload,
            reply,
        })
        .await?
    }

    pub(crate) async fn validated_move(
        &self,
        sender: ConnectionId,
        payload: MovePayload,
    ) -> Result<(), RoomError> {
        self.request(|reply| RoomCommand::ValidatedMove {
            sender,
            payload,
            reply,
        })
        .await?
    }

    pub(crate) async fn reset(
        &self,
        sender: ConnectionId,
    ) -> Result<(), RoomError> {
        self.request(|reply| RoomCommand::Reset { sender, reply })
            .await?
    }

    pub(crate) async fn info(&self) -> Result<RoomInfo, RoomError> {
        self.request(|reply| RoomCommand::Info { reply }).await
    }

    pub(crate) async fn close_if_idle(
        &self,
        max_idle: Duration,
    ) -> Result<Option<Vec<ConnectionId>>, RoomError> {
        self.request(|reply| RoomCommand::CloseIfIdle { max_idle, reply })
            .await
    }
}

/// The internal room actor state. Runs inside a Tokio task.
struct RoomSession {
    id: RoomId,
    key: RoomKey,
    /// Seated connections, in join order. Never longer than `SEATS`.
    members: Vec<Member>,
    board: Board,
    last_activity: Instant,
    receiver: mpsc::Receiver<RoomCommand>,
}

impl RoomSession {
    /// Runs the actor loop until the room empties or is closed.
    ///
    /// Commands still queued when the loop exits are dropped with the
    /// receiver; their callers see `Unavailable`.
    async fn run(mut self) {
        tracing::debug!(room = %self.key, id = %self.id, "room actor started");

        while let Some(cmd) = self.receiver.recv().await {
            if self.handle(cmd).is_break() {
                break;
            }
        }

        tracing::debug!(room = %self.key, id = %self.id, "room actor stopped");
    }

    fn handle(&mut self, cmd: RoomCommand) -> ControlFlow<()> {
        match cmd {
            RoomCommand::Join { member, reply } => {
                let result = self.handle_join(member);
                self.touch_if(result.is_ok());
                let _ = reply.send(result);
            }
            RoomCommand::Leave { connection, reply } => {
                let remaining = self.handle_leave(connection);
                self.touch_if(remaining.is_some());
                let _ = reply.send(remaining);
                if remaining == Some(0) {
                    return ControlFlow::Break(());
                }
            }
            RoomCommand::Relay {
                sender,
                payload,
                reply,
            } => {
                let result = self.handle_relay(sender, payload);
                self.touch_if(result.is_ok());
                let _ = reply.send(result);
            }
            RoomCommand::ValidatedMove {
                sender,
                payload,
                reply,
            } => {
                let result = self.handle_validated_move(sender, payload);
                self.touch_if(result.is_ok());
                let _ = reply.send(result);
            }
            RoomCommand::Reset { sender, reply } => {
                let result = self.handle_reset(sender);
                self.touch_if(result.is_ok());
                let _ = reply.send(result);
            }
            RoomCommand::Info { reply } => {
                let _ = reply.send(self.info());
            }
            RoomCommand::CloseIfIdle { max_idle, reply } => {
                if self.phase().is_joinable()
                    && self.last_activity.elapsed() >= max_idle
                {
                    let evicted = self.close("idle");
                    let _ = reply.send(Some(evicted));
                    return ControlFlow::Break(());
                }
                let _ = reply.send(None);
            }
        }
        ControlFlow::Continue(())
    }

    fn handle_join(&mut self, member: Member) -> Result<usize, RoomError> {
        let joined = ServerEvent::GameJoined {
            room_key: self.key.clone(),
        };

        // Re-join by a seated connection re-confirms the seat and nothing
        // else: no second `memberJoined` for the other member.
        if let Some(seat) =
            self.members.iter_mut().find(|m| m.id() == member.id())
        {
            *seat = member;
            seat.send(joined);
            return Ok(self.members.len());
        }

        if self.members.len() >= SEATS {
            return Err(RoomError::RoomFull(self.key.clone()));
        }

        let joiner = member.id();
        member.send(joined);
        self.members.push(member);
        tracing::info!(
            room = %self.key,
            conn = %joiner,
            members = self.members.len(),
            "member joined"
        );

        if self.members.len() == SEATS {
            let notice = ServerEvent::MemberJoined {
                connection_id: joiner,
            };
            for other in self.members.iter().filter(|m| m.id() != joiner) {
                other.send(notice.clone());
            }
        }

        Ok(self.members.len())
    }

    fn handle_leave(&mut self, connection: ConnectionId) -> Option<usize> {
        let seat = self.members.iter().position(|m| m.id() == connection)?;
        self.members.remove(seat);

        tracing::info!(
            room = %self.key,
            conn = %connection,
            members = self.members.len(),
            "member left"
        );

        self.broadcast(&ServerEvent::MemberLeft {
            connection_id: connection,
        });
        Some(self.members.len())
    }

    fn handle_relay(
        &self,
        sender: ConnectionId,
        payload: MovePayload,
    ) -> Result<(), RoomError> {
        self.ensure_member(sender)?;
        tracing::debug!(
            room = %self.key,
            conn = %sender,
            cell = payload.cell_index,
            symbol = %payload.symbol,
            "relaying move"
        );
        self.broadcast(&ServerEvent::Move(payload));
        Ok(())
    }

    fn handle_validated_move(
        &mut self,
        sender: ConnectionId,
        payload: MovePayload,
    ) -> Result<(), RoomError> {
        self.ensure_member(sender)?;
        self.board.apply(sender, &payload)?;
        tracing::debug!(
            room = %self.key,
            conn = %sender,
            cell = payload.cell_index,
            symbol = %payload.symbol,
            "validated move applied"
        );
        self.broadcast(&ServerEvent::Move(payload));
        if let Some(outcome) = self.board.outcome() {
            tracing::info!(room = %self.key, ?outcome, "board finished");
        }
        Ok(())
    }

    fn handle_reset(&mut self, sender: ConnectionId) -> Result<(), RoomError> {
        self.ensure_member(sender)?;
        self.board.clear();
        tracing::debug!(room = %self.key, conn = %sender, "game reset");
        self.broadcast(&ServerEvent::ResetGame);
        Ok(())
    }

    /// Tells every member the room is gone and empties the seats.
    fn close(&mut self, reason: &str) -> Vec<ConnectionId> {
        tracing::info!(
            room = %self.key,
            members = self.members.len(),
            reason,
            "closing room"
        );
        self.broadcast(&ServerEvent::RoomClosed {
            room_key: self.key.clone(),
            reason: reason.to_owned(),
        });
        self.members.drain(..).map(|m| m.id()).collect()
    }

    fn ensure_member(&self, connection: ConnectionId) -> Result<(), RoomError> {
        if self.members.iter().any(|m| m.id() == connection) {
            Ok(())
        } else {
            Err(RoomError::NotMember(connection, self.key.clone()))
        }
    }

    /// Delivers an event to every member. A member whose mailbox is gone
    /// is skipped; the others still get the event.
    fn broadcast(&self, event: &ServerEvent) {
        for member in &self.members {
            if !member.send(event.clone()) {
                tracing::debug!(
                    room = %self.key,
                    conn = %member.id(),
                    "mailbox closed, event dropped"
                );
            }
        }
    }

    fn touch_if(&mut self, succeeded: bool) {
        if succeeded {
            self.last_activity = Instant::now();
        }
    }

    fn phase(&self) -> RoomPhase {
        RoomPhase::from_members(self.members.len())
    }

    fn info(&self) -> RoomInfo {
        RoomInfo {
            id: self.id,
            key: self.key.clone(),
            phase: self.phase(),
            members: self.members.iter().map(Member::id).collect(),
            idle_for: self.last_activity.elapsed(),
        }
    }
}

/// Spawns a new room actor task and returns a handle to communicate with it.
///
/// `channel_size` bounds the command queue (minimum 1); senders wait when
/// it is full.
pub(crate) fn spawn_room(
    id: RoomId,
    key: RoomKey,
    channel_size: usize,
) -> RoomHandle {
    let (tx, rx) = mpsc::channel(channel_size.max(1));

    let actor = RoomSession {
        id,
        key: key.clone(),
        members: Vec::with_capacity(SEATS),
        board: Board::new(),
        last_activity: Instant::now(),
        receiver: rx,
    };

    tokio::spawn(actor.run());

    RoomHandle {
        id,
        key,
        sender: tx,
    }
}
