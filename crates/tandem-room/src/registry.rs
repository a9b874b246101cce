//! Session registry: maps room keys to room actors and tracks seats.
//!
//! The registry is built once by the server and shared by every
//! connection task. It owns two small tables:
//!
//! - `rooms`: room key → handle of the actor currently serving that key
//! - `seats`: connection → the room (key and actor id) it sits in
//!
//! Both are sharded concurrent maps, and no entry guard is ever held across
//! an `.await`. Everything that must be atomic for one room (capacity
//! check, seat change, broadcast) happens inside that room's actor, so
//! traffic in one room never waits on another.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tandem_protocol::{ConnectionId, MovePayload, RoomKey};

use crate::room::{RoomHandle, spawn_room};
use crate::{Member, RegistryConfig, RoomError, RoomId, RoomInfo};

/// How many times a join retries when the room it found shut down under it.
const MAX_JOIN_ATTEMPTS: usize = 3;

/// Where a connection sits: the key it joined with and the actor that
/// seated it.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Seat {
    key: RoomKey,
    room: RoomId,
}

/// Holds all active rooms and every connection's seat.
///
/// ## Lifecycle of a room
///
/// ```text
/// join (unseen key) ──→ spawn actor ──→ [Waiting] ──join──→ [Active]
///                                          ↑                    │
///                                          └──────leave─────────┘
///                                          │
///                                 leave (last member) / idle sweep
///                                          ↓
///                                   actor stops, entry removed
/// ```
pub struct Registry {
    rooms: DashMap<RoomKey, RoomHandle>,
    seats: DashMap<ConnectionId, Seat>,
    next_room_id: AtomicU64,
    config: RegistryConfig,
}

impl Registry {
    /// Creates an empty registry.
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            rooms: DashMap::new(),
            seats: DashMap::new(),
            next_room_id: AtomicU64::new(1),
            config,
        }
    }

    /// The settings this registry was built with.
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Seats `member` in the room for `key`, creating the room if needed.
    ///
    /// Returns the room's member count after the join (1 or 2). The room
    /// sends `gameJoined` to the joiner and, when the second seat is
    /// taken, `memberJoined` to the first member. Joining a room the
    /// connection already sits in re-confirms the seat.
    ///
    /// # Errors
    /// - [`RoomError::RoomFull`] — both seats belong to other connections
    /// - [`RoomError::AlreadyInRoom`] — the connection sits in another room
    pub async fn join(
        &self,
        member: &Member,
        key: &RoomKey,
    ) -> Result<usize, RoomError> {
        let conn = member.id();
        if let Some(seat) = self.seat(conn) {
            if seat.key != *key {
                return Err(RoomError::AlreadyInRoom(conn, seat.key));
            }
        }

        let mut attempts = 0;
        loop {
            let handle = self.get_or_create(key);
            match handle.join(member.clone()).await {
                Ok(members) => {
                    self.seats.insert(
                        conn,
                        Seat {
                            key: key.clone(),
                            room: handle.id(),
                        },
                    );
                    return Ok(members);
                }
                // The actor stopped between lookup and join (its last
                // member just left, or it was swept). Start over with a
                // fresh room.
                Err(RoomError::Unavailable(_))
                    if attempts + 1 < MAX_JOIN_ATTEMPTS =>
                {
                    attempts += 1;
                    self.forget(key, handle.id());
                    tracing::debug!(
                        room = %key,
                        %conn,
                        attempts,
                        "room closed during join, retrying"
                    );
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Broadcasts a move, unmodified, to every member of the room
    /// (sender included).
    ///
    /// # Errors
    /// - [`RoomError::UnknownRoom`] — no room is tracked for `key`
    /// - [`RoomError::NotMember`] — `conn` holds no seat there
    pub async fn relay(
        &self,
        conn: ConnectionId,
        key: &RoomKey,
        payload: MovePayload,
    ) -> Result<(), RoomError> {
        let handle = self.lookup(key)?;
        handle.relay(conn, payload).await.map_err(settle)
    }

    /// Applies a move to the room's board and broadcasts it like
    /// [`relay`](Self::relay) if it is legal.
    ///
    /// # Errors
    /// Everything `relay` returns, plus [`RoomError::IllegalMove`].
    pub async fn validated_move(
        &self,
        conn: ConnectionId,
        key: &RoomKey,
        payload: MovePayload,
    ) -> Result<(), RoomError> {
        let handle = self.lookup(key)?;
        handle.validated_move(conn, payload).await.map_err(settle)
    }

    /// Clears the room's board and broadcasts `resetGame` to every member.
    ///
    /// # Errors
    /// Same as [`relay`](Self::relay).
    pub async fn reset(
        &self,
        conn: ConnectionId,
        key: &RoomKey,
    ) -> Result<(), RoomError> {
        let handle = self.lookup(key)?;
        handle.reset(conn).await.map_err(settle)
    }

    /// Frees the connection's seat, if it has one.
    ///
    /// The remaining member gets `memberLeft`; a room left empty is
    /// dropped. Safe to call for a connection that never joined, and safe
    /// to call twice. Returns the key of the room that was left.
    pub async fn leave(&self, conn: ConnectionId) -> Option<RoomKey> {
        let (_, seat) = self.seats.remove(&conn)?;

        let handle = self
            .rooms
            .get(&seat.key)
            .filter(|h| h.id() == seat.room)
            .map(|h| h.value().clone());
        let Some(handle) = handle else {
            return Some(seat.key);
        };

        match handle.leave(conn).await {
            Ok(Some(0)) => {
                self.forget(&seat.key, seat.room);
                tracing::info!(room = %seat.key, "room destroyed");
            }
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(room = %seat.key, %conn, error = %e, "leave found no room");
            }
        }
        Some(seat.key)
    }

    /// Closes every Empty or Waiting room whose last successful command is
    /// at least `max_idle` old. Active rooms are never touched.
    ///
    /// The lingering member of each closed room receives `roomClosed` and
    /// loses its seat. Returns the keys of the closed rooms.
    pub async fn sweep_idle(&self, max_idle: Duration) -> Vec<RoomKey> {
        let handles: Vec<RoomHandle> =
            self.rooms.iter().map(|entry| entry.value().clone()).collect();

        let mut closed = Vec::new();
        for handle in handles {
            let Ok(Some(evicted)) = handle.close_if_idle(max_idle).await else {
                continue;
            };
            let id = handle.id();
            for conn in evicted {
                self.seats.remove_if(&conn, |_, seat| seat.room == id);
            }
            if self.forget(handle.key(), id) {
                closed.push(handle.key().clone());
            }
        }

        if !closed.is_empty() {
            tracing::info!(rooms = closed.len(), "idle rooms closed");
        }
        closed
    }

    /// Returns a snapshot of the room for `key`, if one is open.
    pub async fn room_info(&self, key: &RoomKey) -> Option<RoomInfo> {
        let handle = self.lookup(key).ok()?;
        handle.info().await.ok()
    }

    /// Number of rooms currently tracked.
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// The key of the room the connection sits in, if any.
    pub fn membership(&self, conn: ConnectionId) -> Option<RoomKey> {
        self.seat(conn).map(|s| s.key)
    }

    fn seat(&self, conn: ConnectionId) -> Option<Seat> {
        self.seats.get(&conn).map(|s| s.value().clone())
    }

    /// Returns the live handle for `key`.
    fn lookup(&self, key: &RoomKey) -> Result<RoomHandle, RoomError> {
        self.rooms
            .get(key)
            .filter(|h| !h.is_closed())
            .map(|h| h.value().clone())
            .ok_or_else(|| RoomError::UnknownRoom(key.clone()))
    }

    /// Returns the live handle for `key`, spawning a room if there is none.
    ///
    /// The entry's shard stays locked until the new actor is registered, so
    /// two joiners racing on one key end up with the same room.
    fn get_or_create(&self, key: &RoomKey) -> RoomHandle {
        match self.rooms.entry(key.clone()) {
            Entry::Occupied(mut entry) => {
                if !entry.get().is_closed() {
                    return entry.get().clone();
                }
                let handle = self.spawn(key);
                entry.insert(handle.clone());
                handle
            }
            Entry::Vacant(entry) => {
                let handle = self.spawn(key);
                entry.insert(handle.clone());
                handle
            }
        }
    }

    fn spawn(&self, key: &RoomKey) -> RoomHandle {
        let id = RoomId::new(self.next_room_id.fetch_add(1, Ordering::Relaxed));
        tracing::info!(room = %key, %id, "room created");
        spawn_room(id, key.clone(), self.config.command_buffer)
    }

    /// Drops the entry for `key` if it still points at actor `room`.
    /// Returns whether an entry was removed.
    fn forget(&self, key: &RoomKey, room: RoomId) -> bool {
        self.rooms.remove_if(key, |_, h| h.id() == room).is_some()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new(RegistryConfig::default())
    }
}

/// A room that stopped while serving a request is, for the requester, a
/// room that isn't there.
fn settle(err: RoomError) -> RoomError {
    match err {
        RoomError::Unavailable(key) => RoomError::UnknownRoom(key),
        other => other,
    }
}
