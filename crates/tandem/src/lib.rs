//! # Tandem
//!
//! Real-time session coordinator for two-seat games played in the browser.
//!
//! Clients open a WebSocket, join a room by key, and Tandem relays their
//! moves to everyone in that room. Rooms hold at most two connections;
//! the second joiner turns a Waiting room Active, and the room is dropped
//! when the last member leaves.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tandem::prelude::*;
//!
//! # async fn start() -> Result<(), TandemError> {
//! let config = ServerConfig::from_env()?;
//! init_tracing(&config.log_level);
//!
//! let server = TandemServerBuilder::from_config(&config).build().await?;
//! server.run().await
//! # }
//! ```

mod config;
mod error;
mod handler;
mod server;
mod telemetry;

pub use config::{ConfigError, DEFAULT_BIND_ADDR, DEFAULT_LOG_LEVEL, ServerConfig};
pub use error::TandemError;
pub use server::{TandemServer, TandemServerBuilder};
pub use telemetry::init_tracing;

/// Everything needed to start a server and talk about its rooms.
pub mod prelude {
    pub use crate::{
        ConfigError, ServerConfig, TandemError, TandemServer,
        TandemServerBuilder, init_tracing,
    };
    pub use tandem_protocol::{
        ClientEvent, Codec, ConnectionId, ErrorReason, JsonCodec, MovePayload,
        MoveRequest, RoomKey, ServerEvent, Symbol,
    };
    pub use tandem_room::{
        Board, MoveRejection, Outcome, Registry, RegistryConfig, RoomError,
        RoomInfo, RoomPhase,
    };
}
