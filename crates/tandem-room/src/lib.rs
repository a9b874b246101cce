//! Room lifecycle management for Tandem.
//!
//! Each room runs as an isolated Tokio task (actor model) that owns its
//! seats, its board and the mailboxes of the connections sitting in it.
//! The [`Registry`] maps room keys to those actors and remembers which
//! connection sits where.
//!
//! # Key types
//!
//! - [`Registry`] — join/relay/reset/leave entry point, one per process
//! - [`Member`] — a connection's id plus its outbound mailbox
//! - [`RoomPhase`] — Empty → Waiting → Active, derived from seat count
//! - [`Board`] — validated-move bookkeeping and the win/draw helper
//! - [`RegistryConfig`] — actor buffer size and the optional idle sweep

mod board;
mod config;
mod error;
mod member;
mod registry;
mod room;

pub use board::{Board, CELLS, MoveRejection, Outcome};
pub use config::{RegistryConfig, RoomPhase, SEATS};
pub use error::RoomError;
pub use member::{Member, MemberSender};
pub use registry::Registry;
pub use room::{RoomId, RoomInfo};
