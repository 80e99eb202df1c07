//! The player registry: the directory's private table of admitted players.
//!
//! # Concurrency note
//!
//! `PlayerRegistry` is NOT thread-safe by itself: it is a plain `HashMap`
//! owned by the directory actor and touched only from that actor's
//! mailbox loop. Nobody else reads or writes it; other components learn
//! about players through messages.

use std::collections::HashMap;

use rampart_protocol::PlayerId;
use rand::Rng;

use crate::{PlayerSession, PlayerStats, SessionError};

/// Every player currently admitted, keyed by player ID.
///
/// ## Lifecycle
///
/// ```text
///  admit_new() ──┐
///                ├──→ [Admitted] ──→ remove() ──→ (persisted by the caller)
///  restore()  ───┘
/// ```
///
/// Player IDs come from a monotonic counter and are never reused within
/// the process, even after removals.
#[derive(Debug)]
pub struct PlayerRegistry {
    sessions: HashMap<PlayerId, PlayerSession>,

    /// The next ID handed out by [`admit_new`](Self::admit_new).
    next_id: u64,

    /// Maximum concurrent sessions; 0 means unlimited.
    max_players: usize,
}

impl PlayerRegistry {
    /// Creates an empty registry. `max_players == 0` disables the limit.
    pub fn new(max_players: usize) -> Self {
        Self {
            sessions: HashMap::new(),
            next_id: 1,
            max_players,
        }
    }

    /// Admits a brand-new player with a fresh ID, default stats, and a new
    /// resume token. A missing or blank `name` becomes `Player_<n>`.
    ///
    /// # Errors
    /// Returns [`SessionError::DirectoryFull`] at capacity.
    pub fn admit_new(
        &mut self,
        name: Option<String>,
    ) -> Result<&PlayerSession, SessionError> {
        self.check_capacity()?;

        let id = PlayerId(self.next_id);
        self.next_id += 1;

        let name = name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| PlayerSession::default_name(id));

        let session = PlayerSession {
            id,
            name,
            stats: PlayerStats::default(),
            resume_token: generate_token(),
        };

        tracing::info!(player_id = %id, name = %session.name, "player admitted");
        Ok(self.sessions.entry(id).or_insert(session))
    }

    /// Re-admits a previously persisted session if `token` matches its
    /// resume token. The token is rotated on success.
    ///
    /// # Errors
    /// - [`SessionError::InvalidToken`] if the token doesn't match
    /// - [`SessionError::AlreadyAdmitted`] if the player is online
    /// - [`SessionError::DirectoryFull`] at capacity
    pub fn restore(
        &mut self,
        mut session: PlayerSession,
        token: &str,
    ) -> Result<&PlayerSession, SessionError> {
        if session.resume_token != token {
            return Err(SessionError::InvalidToken);
        }
        if self.sessions.contains_key(&session.id) {
            return Err(SessionError::AlreadyAdmitted(session.id));
        }
        self.check_capacity()?;

        // Keep fresh IDs clear of anything restored from an earlier run.
        self.next_id = self.next_id.max(session.id.0 + 1);
        session.resume_token = generate_token();

        let id = session.id;
        tracing::info!(player_id = %id, "player resumed");
        Ok(self.sessions.entry(id).or_insert(session))
    }

    /// Removes a player, returning their session if they were admitted.
    pub fn remove(&mut self, id: PlayerId) -> Option<PlayerSession> {
        let removed = self.sessions.remove(&id);
        if removed.is_some() {
            tracing::info!(player_id = %id, "player removed");
        }
        removed
    }

    pub fn get(&self, id: PlayerId) -> Option<&PlayerSession> {
        self.sessions.get(&id)
    }

    pub fn contains(&self, id: PlayerId) -> bool {
        self.sessions.contains_key(&id)
    }

    /// IDs of every admitted player, in no particular order.
    pub fn ids(&self) -> impl Iterator<Item = PlayerId> + '_ {
        self.sessions.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    fn check_capacity(&self) -> Result<(), SessionError> {
        if self.max_players > 0 && self.sessions.len() >= self.max_players {
            return Err(SessionError::DirectoryFull(self.max_players));
        }
        Ok(())
    }
}

/// Generates a random 32-character hex string (128 bits of entropy).
fn generate_token() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 16] = rng.random();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    //! Naming convention: `test_{function}_{scenario}_{expected}`.

    use super::*;

    fn unlimited() -> PlayerRegistry {
        PlayerRegistry::new(0)
    }

    // =====================================================================
    // admit_new()
    // =====================================================================

    #[test]
    fn test_admit_new_assigns_sequential_ids() {
        let mut reg = unlimited();
        let a = reg.admit_new(None).unwrap().id;
        let b = reg.admit_new(None).unwrap().id;
        assert_eq!((a, b), (PlayerId(1), PlayerId(2)));
    }

    #[test]
    fn test_admit_new_without_name_uses_default_name() {
        let mut reg = unlimited();
        let session = reg.admit_new(None).unwrap();
        assert_eq!(session.name, "Player_1");
        assert_eq!(session.stats, PlayerStats::default());
        assert_eq!(session.resume_token.len(), 32);
    }

    #[test]
    fn test_admit_new_blank_name_uses_default_name() {
        let mut reg = unlimited();
        let session = reg.admit_new(Some("   ".into())).unwrap();
        assert_eq!(session.name, "Player_1");
    }

    #[test]
    fn test_admit_new_ids_not_reused_after_remove() {
        let mut reg = unlimited();
        reg.admit_new(None).unwrap();
        let second = reg.admit_new(None).unwrap().id;
        reg.remove(PlayerId(1));

        // A `len + 1` scheme would hand out player_2 again here.
        let third = reg.admit_new(None).unwrap().id;
        assert_ne!(third, second);
        assert_eq!(third, PlayerId(3));
    }

    #[test]
    fn test_admit_new_at_capacity_returns_full() {
        let mut reg = PlayerRegistry::new(1);
        reg.admit_new(None).unwrap();

        let result = reg.admit_new(None);
        assert!(matches!(result, Err(SessionError::DirectoryFull(1))));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn test_admit_new_tokens_are_unique() {
        let mut reg = unlimited();
        let t1 = reg.admit_new(None).unwrap().resume_token.clone();
        let t2 = reg.admit_new(None).unwrap().resume_token.clone();
        assert_ne!(t1, t2);
    }

    // =====================================================================
    // restore()
    // =====================================================================

    fn persisted(id: u64) -> PlayerSession {
        PlayerSession {
            id: PlayerId(id),
            name: "Ayla".into(),
            stats: PlayerStats {
                level: 4,
                hp: 80,
                attack: 14,
                defense: 9,
            },
            resume_token: "ab".repeat(16),
        }
    }

    #[test]
    fn test_restore_matching_token_readmits_with_stats() {
        let mut reg = unlimited();
        let token = "ab".repeat(16);

        let session = reg.restore(persisted(7), &token).unwrap();
        assert_eq!(session.id, PlayerId(7));
        assert_eq!(session.stats.level, 4);
        assert_ne!(session.resume_token, token, "token should rotate");
    }

    #[test]
    fn test_restore_wrong_token_returns_invalid() {
        let mut reg = unlimited();
        let result = reg.restore(persisted(7), "nope");
        assert!(matches!(result, Err(SessionError::InvalidToken)));
        assert!(reg.is_empty());
    }

    #[test]
    fn test_restore_online_player_returns_already_admitted() {
        let mut reg = unlimited();
        let token = "ab".repeat(16);
        reg.restore(persisted(7), &token).unwrap();

        let result = reg.restore(persisted(7), &token);
        assert!(matches!(
            result,
            Err(SessionError::AlreadyAdmitted(PlayerId(7)))
        ));
    }

    #[test]
    fn test_restore_advances_counter_past_restored_id() {
        let mut reg = unlimited();
        reg.restore(persisted(7), &"ab".repeat(16)).unwrap();

        let fresh = reg.admit_new(None).unwrap().id;
        assert_eq!(fresh, PlayerId(8));
    }

    // =====================================================================
    // remove() / queries
    // =====================================================================

    #[test]
    fn test_remove_unknown_player_returns_none() {
        let mut reg = unlimited();
        assert!(reg.remove(PlayerId(1)).is_none());
    }

    #[test]
    fn test_remove_frees_capacity() {
        let mut reg = PlayerRegistry::new(1);
        let id = reg.admit_new(None).unwrap().id;
        reg.remove(id);

        assert!(!reg.contains(id));
        assert!(reg.admit_new(None).is_ok());
    }

    #[test]
    fn test_ids_lists_every_admitted_player() {
        let mut reg = unlimited();
        reg.admit_new(None).unwrap();
        reg.admit_new(None).unwrap();

        let mut ids: Vec<_> = reg.ids().collect();
        ids.sort();
        assert_eq!(ids, vec![PlayerId(1), PlayerId(2)]);
    }
}
