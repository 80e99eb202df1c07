//! Drop accounting.
//!
//! Every message an actor discards is classified by a [`DropReason`] and
//! counted in that actor's [`RouteStats`]. A `Stats` query on any handle
//! returns the counters, so "the envelope was dropped" is something a
//! test can assert rather than infer from silence.

use std::collections::BTreeMap;
use std::fmt;

/// Why an actor discarded a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DropReason {
    /// Envelope addressed to a player with no bound connection.
    UnboundPlayer,
    /// Inbound bytes that didn't decode as a frame or envelope.
    DecodeFailed,
    /// Message for a connection the gateway doesn't know.
    UnknownConnection,
    /// Message for a connection that is being torn down.
    ConnectionClosing,
    /// The connection's send queue was full or closed.
    SendFailed,
    /// The target component's address is unknown or its mailbox is gone.
    PeerUnavailable,
    /// A combat participant left before the result could be delivered.
    ParticipantLeft,
    /// A combat result with no matching pending request.
    StaleCombatResult,
    /// An admission whose connection or player was already bound.
    BindingConflict,
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::UnboundPlayer => "unbound-player",
            Self::DecodeFailed => "decode-failed",
            Self::UnknownConnection => "unknown-connection",
            Self::ConnectionClosing => "connection-closing",
            Self::SendFailed => "send-failed",
            Self::PeerUnavailable => "peer-unavailable",
            Self::ParticipantLeft => "participant-left",
            Self::StaleCombatResult => "stale-combat-result",
            Self::BindingConflict => "binding-conflict",
        })
    }
}

/// Per-actor delivery and drop counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteStats {
    delivered: u64,
    drops: BTreeMap<DropReason, u64>,
}

impl RouteStats {
    /// Counts one successfully handed-off message.
    pub fn record_delivery(&mut self) {
        self.delivered += 1;
    }

    /// Counts one dropped message.
    pub fn record_drop(&mut self, reason: DropReason) {
        *self.drops.entry(reason).or_default() += 1;
    }

    /// Messages handed off. For the gateway this means "queued on a
    /// connection"; for the other actors, "sent to a peer".
    pub fn delivered(&self) -> u64 {
        self.delivered
    }

    pub fn dropped(&self, reason: DropReason) -> u64 {
        self.drops.get(&reason).copied().unwrap_or(0)
    }

    pub fn total_dropped(&self) -> u64 {
        self.drops.values().sum()
    }

    /// Non-zero drop counters, ordered by reason.
    pub fn drops(&self) -> impl Iterator<Item = (DropReason, u64)> + '_ {
        self.drops.iter().map(|(reason, count)| (*reason, *count))
    }
}
