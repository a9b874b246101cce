//! Error types for the protocol layer.

/// Errors that can occur while encoding or decoding wire events.
///
/// A `ProtocolError` always means the bytes and the types disagreed; it
/// never says anything about rooms or connections.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning an event into bytes).
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed (turning bytes into an event).
    ///
    /// Common causes: malformed JSON, an unknown event name, a symbol
    /// other than `X`/`O`, or a missing `roomKey`.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),
}
