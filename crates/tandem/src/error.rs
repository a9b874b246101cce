//! Unified error type for Tandem.

use tandem_protocol::ProtocolError;
use tandem_room::RoomError;
use tandem_transport::TransportError;

use crate::ConfigError;

/// Top-level error that wraps every layer's error.
///
/// The `#[from]` attribute on each variant auto-generates `From` impls,
/// so `?` converts layer errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum TandemError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A room-level error (full, unknown, not a member).
    #[error(transparent)]
    Room(#[from] RoomError),

    /// The environment held an unusable setting.
    #[error(transparent)]
    Config(#[from] ConfigError),
}
