//! Wire protocol for Tandem.
//!
//! This crate defines what clients and the coordinator say to each other:
//!
//! - **Types** ([`ClientEvent`], [`ServerEvent`], [`RoomKey`], [`Symbol`]) —
//!   the named events that travel on the wire.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]) — how those events are
//!   converted to and from bytes.
//! - **Errors** ([`ProtocolError`]) — what can go wrong while doing so.
//!
//! Every frame is an object `{"event": <name>, "data": <payload>}` so a
//! browser client can dispatch on the event name, the same shape an
//! event-emitter socket library would produce.
//!
//! ```text
//! Transport (bytes) → Protocol (ClientEvent) → Room (registry, actors)
//! ```

mod codec;
mod error;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{
    CellIndex, ClientEvent, ErrorReason, MovePayload, MoveRequest, RoomKey,
    ServerEvent, Symbol,
};

/// Re-exported so downstream crates name connections the same way.
pub use tandem_transport::ConnectionId;
