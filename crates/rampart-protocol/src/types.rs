//! Core wire types: the top-level [`Frame`] and the nested [`GameEnvelope`].
//!
//! Every byte string exchanged with a client is one encoded `Frame`.
//! Frames of kind [`FrameKind::Game`] carry an encoded `GameEnvelope` in
//! their payload, and the envelope in turn carries an encoded payload
//! struct (see [`crate::message`]):
//!
//! ```text
//! ┌ Frame ─────────────────────────────────────┐
//! │ type: Game                                 │
//! │ ┌ GameEnvelope ──────────────────────────┐ │
//! │ │ type: "chat"                           │ │
//! │ │ id:   "player_3"     ← correlation id  │ │
//! │ │ payload: {"content": "hi"}             │ │
//! │ └────────────────────────────────────────┘ │
//! └────────────────────────────────────────────┘
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{MessageKind, ProtocolError};

// ---------------------------------------------------------------------------
// PlayerId
// ---------------------------------------------------------------------------

/// A unique identifier for an admitted player.
///
/// Rendered on the wire as `"player_<n>"`, the shape clients already
/// use as the correlation id of their envelopes. The serde attributes
/// route (de)serialization through that string form, so a `PlayerId(3)`
/// becomes `"player_3"` in JSON instead of `3`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(try_from = "String", into = "String")]
pub struct PlayerId(pub u64);

const PLAYER_PREFIX: &str = "player_";

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{PLAYER_PREFIX}{}", self.0)
    }
}

impl FromStr for PlayerId {
    type Err = ProtocolError;

    /// Accepts only the canonical form: no sign, no leading zeros.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.strip_prefix(PLAYER_PREFIX)
            .and_then(|digits| {
                let n: u64 = digits.parse().ok()?;
                (n.to_string() == digits).then_some(PlayerId(n))
            })
            .ok_or_else(|| ProtocolError::InvalidPlayerId(s.to_string()))
    }
}

impl TryFrom<String> for PlayerId {
    type Error = ProtocolError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PlayerId> for String {
    fn from(id: PlayerId) -> Self {
        id.to_string()
    }
}

// ---------------------------------------------------------------------------
// Frame
// ---------------------------------------------------------------------------

/// The top-level type of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum FrameKind {
    /// Keep-alive. Echoed back verbatim by the gateway.
    Heartbeat,
    /// Free text. Not routed by the core.
    Text,
    /// A transport-level error report.
    Error,
    /// An application message: the payload is an encoded [`GameEnvelope`].
    Game,
}

/// One framed message on a connection: `{type, payload}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    /// What the payload contains.
    #[serde(rename = "type")]
    pub kind: FrameKind,

    /// Opaque bytes; interpretation depends on `kind`.
    #[serde(default)]
    pub payload: Vec<u8>,
}

impl Frame {
    /// Creates a frame.
    pub fn new(kind: FrameKind, payload: Vec<u8>) -> Self {
        Self { kind, payload }
    }
}

// ---------------------------------------------------------------------------
// GameEnvelope
// ---------------------------------------------------------------------------

/// The application-layer envelope nested inside a [`FrameKind::Game`]
/// frame: `{type, id, payload}`.
///
/// `kind` and `id` stay plain strings here because they arrive from
/// untrusted clients: an unknown type or a malformed id must surface as a
/// validation error envelope, not as a frame decode failure. Typed
/// interpretation happens in [`Request::decode`](crate::Request::decode).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameEnvelope {
    /// Message type, e.g. `"chat"` or `"battle_request"`.
    #[serde(rename = "type", default)]
    pub kind: String,

    /// Correlation id. A player id once the sender is admitted, empty
    /// before admission.
    #[serde(default)]
    pub id: String,

    /// The encoded payload struct for `kind`.
    #[serde(default)]
    pub payload: Vec<u8>,
}

impl GameEnvelope {
    /// Creates an envelope of a known kind.
    pub fn new(kind: MessageKind, id: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            kind: kind.as_str().to_string(),
            id: id.into(),
            payload,
        }
    }

    /// Returns a copy of this envelope re-addressed to `id`.
    ///
    /// Fan-out sends one copy per recipient, each carrying the
    /// recipient's own player id.
    pub fn readdressed(&self, id: impl Into<String>) -> Self {
        Self {
            kind: self.kind.clone(),
            id: id.into(),
            payload: self.payload.clone(),
        }
    }
}
