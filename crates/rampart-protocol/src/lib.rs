//! Wire protocol for Rampart.
//!
//! This crate defines what travels between a client and the router:
//!
//! - **Frames** ([`Frame`], [`FrameKind`]) — the top-level `{type, payload}`
//!   unit on a connection.
//! - **Envelopes** ([`GameEnvelope`]) — the nested application message
//!   `{type, id, payload}` carried by `Game` frames.
//! - **Messages** ([`MessageKind`], [`Request`], payload structs) — the
//!   typed view of an envelope.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]) — how all of the above
//!   become bytes.
//!
//! # Architecture
//!
//! ```text
//! Transport (bytes) → Protocol (Frame → GameEnvelope → Request) → Router
//! ```
//!
//! The protocol layer knows nothing about connections, players, or
//! routing. It only knows shapes.

mod codec;
mod error;
mod message;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use message::{
    AdmitRequest, AdmitResponse, ChatBroadcast, ChatRequest, CombatOutcome,
    CombatRequest, ErrorBody, MessageKind, Request, ResumeTicket,
};
pub use types::{Frame, FrameKind, GameEnvelope, PlayerId};
