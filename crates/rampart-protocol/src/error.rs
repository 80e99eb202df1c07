//! Error types for the protocol layer.
//!
//! A `ProtocolError` always means the bytes or the envelope were at fault,
//! never the network or the routing state.

use crate::MessageKind;

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust type into bytes).
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed (turning bytes into a Rust type).
    ///
    /// Common causes: malformed JSON, missing required fields,
    /// wrong data types, or truncated frames.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The envelope is well-formed but semantically invalid, e.g. an
    /// empty type or a missing correlation id.
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// The envelope's `type` string names no known message kind.
    #[error("unknown message type: {0:?}")]
    UnknownKind(String),

    /// A known kind that clients are not allowed to send
    /// (responses, combat results, errors).
    #[error("message type {0} is not accepted from clients")]
    NotAccepted(MessageKind),

    /// A player identifier that does not have the `player_<n>` shape.
    #[error("invalid player id: {0:?}")]
    InvalidPlayerId(String),
}
