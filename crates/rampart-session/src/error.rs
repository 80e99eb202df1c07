//! Error types for the session layer.

use rampart_protocol::PlayerId;

/// Errors from the player registry.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The registry already holds `max_players` sessions.
    #[error("directory is full ({0} players)")]
    DirectoryFull(usize),

    /// No session exists for the given player.
    #[error("session not found for player {0}")]
    NotFound(PlayerId),

    /// The player is currently admitted; a second admission would give one
    /// player identifier two live sessions.
    #[error("player {0} is already admitted")]
    AlreadyAdmitted(PlayerId),

    /// The resume token doesn't match what the server issued.
    #[error("invalid resume token")]
    InvalidToken,
}

/// Errors from a [`PlayerStore`](crate::PlayerStore) implementation.
///
/// The directory never lets one of these fail an admission: a store
/// failure degrades the session to in-memory only.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The backing store could not be reached.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A stored record could not be (de)serialized.
    #[error("corrupt record for {key}: {reason}")]
    Corrupt { key: String, reason: String },
}
