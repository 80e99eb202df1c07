//! Router configuration and the connection state machine.

use std::time::Duration;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// RouterConfig
// ---------------------------------------------------------------------------

/// Capacity limits and timeouts for the routing core.
///
/// None of these change what gets routed where, only how much the router
/// holds before it starts refusing or dropping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Maximum concurrently admitted players. 0 means unlimited.
    pub max_players: usize,

    /// Outbound frames buffered per connection before a write counts as
    /// failed and the connection is torn down.
    pub send_queue_size: usize,

    /// A connection that sends nothing for this long is closed.
    /// Heartbeats count as traffic.
    pub idle_timeout_secs: u64,

    /// Pending combat requests older than this are abandoned and the
    /// attacker gets an error. 0 disables expiry.
    pub combat_timeout_secs: u64,

    /// Upper bound on a single storage call.
    pub store_timeout_ms: u64,

    /// On removal, write the session back to the store (`true`) or delete
    /// it (`false`). Resume only works with `true`.
    pub persist_on_leave: bool,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            max_players: 0,
            send_queue_size: 256,
            idle_timeout_secs: 30,
            combat_timeout_secs: 10,
            store_timeout_ms: 500,
            persist_on_leave: true,
        }
    }
}

impl RouterConfig {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn combat_timeout(&self) -> Duration {
        Duration::from_secs(self.combat_timeout_secs)
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }
}

// ---------------------------------------------------------------------------
// ConnectionState
// ---------------------------------------------------------------------------

/// Liveness of a connection as seen by the gateway.
///
/// ```text
/// Open ──(write failed / queue full)──→ Closing ──(read loop ended)──→ Closed
///   └──────────────────(read loop ended)──────────────────────────────↗
/// ```
///
/// - **Open**: registered, outbound envelopes are written to its queue.
/// - **Closing**: torn down by the gateway; its binding is already
///   released and nothing more is written, but the read loop hasn't
///   reported back yet.
/// - **Closed**: the read loop ended. The gateway forgets the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    Open,
    Closing,
    Closed,
}

impl ConnectionState {
    /// Returns `true` if outbound envelopes may be written.
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open)
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open => write!(f, "Open"),
            Self::Closing => write!(f, "Closing"),
            Self::Closed => write!(f, "Closed"),
        }
    }
}
