//! Registry configuration and the per-room phase machine.

use std::fmt;
use std::time::Duration;

/// Number of seats in every room. Join order is seat order.
pub const SEATS: usize = 2;

// ---------------------------------------------------------------------------
// RegistryConfig
// ---------------------------------------------------------------------------

/// Configuration for a [`Registry`](crate::Registry).
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Close rooms that have sat in Empty or Waiting for this long.
    ///
    /// `None` (the default) keeps an abandoned Waiting room forever.
    pub idle_timeout: Option<Duration>,

    /// How often the server runs the idle sweep when `idle_timeout` is set.
    pub sweep_interval: Duration,

    /// Capacity of each room actor's command channel. Callers wait when
    /// it is full.
    pub command_buffer: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            idle_timeout: None,
            sweep_interval: Duration::from_secs(30),
            command_buffer: 64,
        }
    }
}

// ---------------------------------------------------------------------------
// RoomPhase
// ---------------------------------------------------------------------------

/// The lifecycle phase of a room, derived purely from its seat count.
///
/// ```text
///          join            join (2nd distinct)
/// Empty ─────────→ Waiting ───────────────────→ Active
///   ↑                │  ↑                          │
///   └─── leave ──────┘  └────────── leave ─────────┘
/// ```
///
/// A room that drops back to Empty through a leave is destroyed; Empty is
/// only ever observed on a room that was just created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomPhase {
    Empty,
    Waiting,
    Active,
}

impl RoomPhase {
    /// Maps a seat count onto a phase.
    pub fn from_members(members: usize) -> Self {
        match members {
            0 => Self::Empty,
            n if n < SEATS => Self::Waiting,
            _ => Self::Active,
        }
    }

    /// Returns `true` if a new distinct connection can still take a seat.
    pub fn is_joinable(self) -> bool {
        !matches!(self, Self::Active)
    }
}

impl fmt::Display for RoomPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "Empty"),
            Self::Waiting => write!(f, "Waiting"),
            Self::Active => write!(f, "Active"),
        }
    }
}
