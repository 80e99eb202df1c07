//! Application message kinds and their payloads.
//!
//! The envelope's `type` string is parsed into the closed [`MessageKind`]
//! enum, and client-originated envelopes are decoded into the [`Request`]
//! sum type. Adding a message kind means adding a variant, and every
//! `match` over it stops compiling until the new case is handled.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{Codec, GameEnvelope, PlayerId, ProtocolError};

// ---------------------------------------------------------------------------
// MessageKind
// ---------------------------------------------------------------------------

/// Every application message type the router knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// Client → server: turn this connection into a player.
    Admit,
    /// Server → client: admission succeeded.
    Admitted,
    /// Client → server: say something to everyone.
    Chat,
    /// Server → clients: a chat line, fanned out to every admitted player.
    ChatBroadcast,
    /// Client → server: attack another player.
    CombatRequest,
    /// Combat worker → server → both participants: the outcome.
    CombatResult,
    /// Server → client: a request was rejected.
    Error,
}

impl MessageKind {
    /// The wire string for this kind.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Admit => "player_join",
            Self::Admitted => "player_join_response",
            Self::Chat => "chat",
            Self::ChatBroadcast => "chat_response",
            Self::CombatRequest => "battle_request",
            Self::CombatResult => "battle_result",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageKind {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "player_join" => Self::Admit,
            "player_join_response" => Self::Admitted,
            "chat" => Self::Chat,
            "chat_response" => Self::ChatBroadcast,
            "battle_request" => Self::CombatRequest,
            "battle_result" => Self::CombatResult,
            "error" => Self::Error,
            other => return Err(ProtocolError::UnknownKind(other.to_string())),
        })
    }
}

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

/// Payload of `player_join`. Both fields are optional; an empty payload is
/// a valid anonymous admission.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdmitRequest {
    /// Preferred display name.
    #[serde(default)]
    pub name: Option<String>,

    /// Resume a previously admitted player instead of allocating a new one.
    #[serde(default)]
    pub resume: Option<ResumeTicket>,
}

/// Proof that the client owned `id` in an earlier session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumeTicket {
    pub id: PlayerId,
    pub token: String,
}

/// Payload of `player_join_response`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdmitResponse {
    pub id: PlayerId,
    pub name: String,
    /// Secret to present in a later [`ResumeTicket`].
    pub token: String,
}

/// Payload of `chat`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub content: String,
}

/// Payload of `chat_response`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatBroadcast {
    pub sender: PlayerId,
    pub sender_name: String,
    pub content: String,
    /// Seconds since the Unix epoch.
    pub timestamp: u64,
}

/// Payload of `battle_request`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombatRequest {
    pub attacker_id: PlayerId,
    pub defender_id: PlayerId,
}

/// Payload of `battle_result`.
///
/// `damage_dealt` is unsigned, so a negative magnitude is unrepresentable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombatOutcome {
    pub winner_id: PlayerId,
    pub loser_id: PlayerId,
    pub damage_dealt: u32,
}

/// Payload of `error`. `code` follows HTTP conventions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: u16,
    pub message: String,
    /// The `type` of the envelope that was rejected.
    #[serde(rename = "type")]
    pub kind: String,
}

impl ErrorBody {
    pub const BAD_REQUEST: u16 = 400;
    pub const FORBIDDEN: u16 = 403;
    pub const NOT_FOUND: u16 = 404;
    pub const CONFLICT: u16 = 409;
    pub const UNAVAILABLE: u16 = 503;
    pub const TIMEOUT: u16 = 504;
}

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

/// A decoded client-originated application message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Admit(AdmitRequest),
    Chat(ChatRequest),
    Combat(CombatRequest),
}

impl Request {
    /// Interprets an envelope received from a client.
    ///
    /// # Errors
    /// - [`ProtocolError::UnknownKind`] for an unrecognised `type`
    /// - [`ProtocolError::NotAccepted`] for server-only kinds
    /// - [`ProtocolError::Decode`] when the payload doesn't match the kind
    pub fn decode<C: Codec>(
        envelope: &GameEnvelope,
        codec: &C,
    ) -> Result<Self, ProtocolError> {
        let kind: MessageKind = envelope.kind.parse()?;
        match kind {
            MessageKind::Admit if envelope.payload.is_empty() => {
                Ok(Self::Admit(AdmitRequest::default()))
            }
            MessageKind::Admit => Ok(Self::Admit(codec.decode(&envelope.payload)?)),
            MessageKind::Chat => Ok(Self::Chat(codec.decode(&envelope.payload)?)),
            MessageKind::CombatRequest => {
                Ok(Self::Combat(codec.decode(&envelope.payload)?))
            }
            MessageKind::Admitted
            | MessageKind::ChatBroadcast
            | MessageKind::CombatResult
            | MessageKind::Error => Err(ProtocolError::NotAccepted(kind)),
        }
    }

    /// The kind this request was decoded from.
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::Admit(_) => MessageKind::Admit,
            Self::Chat(_) => MessageKind::Chat,
            Self::Combat(_) => MessageKind::CombatRequest,
        }
    }
}
