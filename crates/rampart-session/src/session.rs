//! Session types: the directory's record of an admitted player.
//!
//! A "session" tracks:
//! - WHO the player is (`PlayerId`, display name)
//! - WHAT they bring to a fight (`PlayerStats`)
//! - HOW they can resume later (a secret token)

use rampart_protocol::PlayerId;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// PlayerStats
// ---------------------------------------------------------------------------

/// Game-relevant numbers attached to a player.
///
/// Only combat policies read these; routing never does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerStats {
    pub level: u32,
    pub hp: u32,
    pub attack: u32,
    pub defense: u32,
}

/// Starting stats for a freshly admitted player.
impl Default for PlayerStats {
    fn default() -> Self {
        Self {
            level: 1,
            hp: 100,
            attack: 10,
            defense: 5,
        }
    }
}

// ---------------------------------------------------------------------------
// PlayerSession
// ---------------------------------------------------------------------------

/// A single admitted player.
///
/// Created by the directory on admission, mutated only by the directory,
/// and persisted through a [`PlayerStore`](crate::PlayerStore) so a later
/// connection can resume it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerSession {
    /// Stable identifier for the player's logical session.
    pub id: PlayerId,

    /// Display name shown in chat.
    pub name: String,

    pub stats: PlayerStats,

    /// A secret the client presents to resume this session after a
    /// disconnect. 32 hex characters (128 bits of randomness).
    pub resume_token: String,
}

impl PlayerSession {
    /// The name given to players who don't choose one: `Player_<n>`.
    pub fn default_name(id: PlayerId) -> String {
        format!("Player_{}", id.0)
    }
}
