//! The session binding table: connection ↔ player.
//!
//! Owned by the gateway alone. Both directions are indexed so either side
//! can be released in O(1), and [`SessionBindings::bind`] refuses anything
//! that would make the relation stop being one-to-one.

use std::collections::HashMap;

use rampart_protocol::PlayerId;
use rampart_transport::ConnectionId;

use crate::RouteError;

/// A bijection between bound connections and admitted players.
#[derive(Debug, Default)]
pub struct SessionBindings {
    by_connection: HashMap<ConnectionId, PlayerId>,
    by_player: HashMap<PlayerId, ConnectionId>,
}

impl SessionBindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `connection` to `player`.
    ///
    /// # Errors
    /// [`RouteError::BindingConflict`] if either side is already bound,
    /// even to each other. The table is left unchanged.
    pub fn bind(
        &mut self,
        connection: ConnectionId,
        player: PlayerId,
    ) -> Result<(), RouteError> {
        if self.by_connection.contains_key(&connection)
            || self.by_player.contains_key(&player)
        {
            return Err(RouteError::BindingConflict { connection, player });
        }
        self.by_connection.insert(connection, player);
        self.by_player.insert(player, connection);
        Ok(())
    }

    /// Releases whatever binding `connection` had, returning the player.
    pub fn release_connection(&mut self, connection: ConnectionId) -> Option<PlayerId> {
        let player = self.by_connection.remove(&connection)?;
        self.by_player.remove(&player);
        Some(player)
    }

    pub fn player_of(&self, connection: ConnectionId) -> Option<PlayerId> {
        self.by_connection.get(&connection).copied()
    }

    pub fn connection_of(&self, player: PlayerId) -> Option<ConnectionId> {
        self.by_player.get(&player).copied()
    }

    pub fn len(&self) -> usize {
        self.by_connection.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_connection.is_empty()
    }

    /// Every binding, sorted by connection.
    pub fn snapshot(&self) -> Vec<(ConnectionId, PlayerId)> {
        let mut pairs: Vec<_> = self
            .by_connection
            .iter()
            .map(|(c, p)| (*c, *p))
            .collect();
        pairs.sort();
        pairs
    }
}
