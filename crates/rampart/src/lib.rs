//! # Rampart
//!
//! Actor-based WebSocket game server.
//!
//! Clients connect over WebSocket, join as players, chat with everyone
//! online, and challenge each other to fights. Behind the socket, three
//! actors do the work without sharing any state:
//!
//! - the **gateway** owns connections and the connection ↔ player bindings,
//! - the **directory** owns the player registry and interprets messages,
//! - the **combat** worker decides fights.
//!
//! See [`rampart_router`] for the routing core.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use rampart::prelude::*;
//!
//! # async fn run() -> Result<(), RampartError> {
//! let config = ServerConfig::from_json_file("rampart.json")?;
//! rampart::logging::init(&config.log_filter);
//!
//! let server = RampartServer::builder().config(config).build().await?;
//! server.run_until(tokio::signal::ctrl_c()).await
//! # }
//! ```

mod config;
mod error;
pub mod logging;
mod server;

pub use config::ServerConfig;
pub use error::RampartError;
pub use server::{RampartServer, RampartServerBuilder};

/// Re-exports for the common case.
pub mod prelude {
    pub use crate::{RampartError, RampartServer, RampartServerBuilder, ServerConfig};

    pub use rampart_protocol::{
        AdmitRequest, AdmitResponse, ChatBroadcast, ChatRequest, Codec, CombatOutcome,
        CombatRequest, ErrorBody, Frame, FrameKind, GameEnvelope, JsonCodec, MessageKind,
        PlayerId, ResumeTicket,
    };
    pub use rampart_router::{
        CoinFlip, CombatPolicy, Combatant, DropReason, RouteStats, Router, RouterConfig,
        StatWeighted,
    };
    pub use rampart_session::{MemoryStore, PlayerSession, PlayerStats, PlayerStore, StoreConfig};
}
