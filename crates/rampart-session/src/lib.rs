//! Player sessions for Rampart.
//!
//! This crate holds the game directory's view of players:
//!
//! 1. **Sessions** — who a player is and what stats they carry
//!    ([`PlayerSession`], [`PlayerStats`])
//! 2. **Registry** — the set of currently admitted players, with ID
//!    allocation and capacity limits ([`PlayerRegistry`])
//! 3. **Storage** — persistence between connections ([`PlayerStore`]
//!    trait, [`MemoryStore`])
//!
//! # How it fits in the stack
//!
//! ```text
//! Router (above)   ← the directory actor owns one PlayerRegistry + store
//!     ↕
//! Session Layer (this crate)
//!     ↕
//! Protocol Layer (below)  ← provides PlayerId
//! ```

mod error;
mod registry;
mod session;
mod store;

pub use error::{SessionError, StoreError};
pub use registry::PlayerRegistry;
pub use session::{PlayerSession, PlayerStats};
pub use store::{MemoryStore, PlayerStore, StoreConfig};
