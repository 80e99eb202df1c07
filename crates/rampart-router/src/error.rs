//! Error types for the routing layer.

use rampart_protocol::PlayerId;
use rampart_transport::ConnectionId;

use crate::Role;

/// Errors returned by router handles and the address exchange.
///
/// Inside the actors nothing here is fatal: a failed send becomes a
/// counted drop (see [`DropReason`](crate::DropReason)), never a crash.
#[derive(Debug, thiserror::Error)]
pub enum RouteError {
    /// The component's mailbox is closed or its address was never
    /// exchanged.
    #[error("{0} is unavailable")]
    PeerUnavailable(Role),

    /// `exchange()` ran before every component registered its address.
    #[error("address exchange incomplete: no {0} address registered")]
    ExchangeIncomplete(Role),

    /// `exchange()` was called a second time. Use `rebind` instead.
    #[error("address exchange already completed")]
    AlreadyExchanged,

    /// The connection or the player is already part of another binding.
    #[error("cannot bind {connection} to {player}: already bound")]
    BindingConflict {
        connection: ConnectionId,
        player: PlayerId,
    },
}
