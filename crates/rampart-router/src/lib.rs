//! The routing core of Rampart.
//!
//! Three long-lived components, each running as an isolated Tokio task
//! (actor model) with its own unbounded mailbox:
//!
//! ```text
//!   connections ⇄ [gateway] ⇄ [directory] ⇄ [combat]
//! ```
//!
//! - the **gateway** owns every connection and the binding table, and is
//!   the only component that writes to a client;
//! - the **directory** owns the player registry and interprets envelopes;
//! - the **combat** worker computes outcomes and knows nobody but the
//!   directory.
//!
//! Components know each other only through [`Address`]es handed out once
//! by the [`AddressExchange`]. Nothing is shared; all state changes happen
//! inside the owning actor.
//!
//! # Key types
//!
//! - [`Router`] — spawns and wires all three components
//! - [`GatewayHandle`] — accept connections, inspect bindings
//! - [`DirectoryHandle`] — list players, read drop counters
//! - [`CombatPolicy`] — the trait deciding who wins a fight
//! - [`RouterConfig`] — capacity limits and timeouts
//! - [`RouteStats`] / [`DropReason`] — delivery and drop accounting

mod binding;
mod combat;
mod config;
mod directory;
mod error;
mod exchange;
mod gateway;
mod mailbox;
mod router;
mod stats;
mod store_worker;

pub use binding::SessionBindings;
pub use combat::{
    CoinFlip, CombatHandle, CombatMsg, CombatPolicy, Combatant, StatWeighted, spawn_combat,
};
pub use config::{ConnectionState, RouterConfig};
pub use directory::{DirectoryHandle, DirectoryMsg, spawn_directory};
pub use error::RouteError;
pub use exchange::AddressExchange;
pub use gateway::{
    FanoutMode, GatewayHandle, GatewayMsg, Route, UNSUPPORTED_FRAME, spawn_gateway,
};
pub use mailbox::{Address, ComponentHandle, MailboxMessage, PeerAddress, Role, mailbox};
pub use router::Router;
pub use stats::{DropReason, RouteStats};
