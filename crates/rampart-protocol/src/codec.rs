//! Codec trait and implementations for serializing/deserializing frames.
//!
//! The binary schema on the wire is an external concern: the router only
//! needs *something* that turns a [`Frame`](crate::Frame), a
//! [`GameEnvelope`](crate::GameEnvelope) or a payload struct into bytes and
//! back. Swapping the codec never touches routing code.
//!
//! [`JsonCodec`] is provided for development and tests.

use serde::{Serialize, de::DeserializeOwned};

use crate::ProtocolError;

/// A codec that can encode Rust types to bytes and decode bytes back.
///
/// ## Trait bounds
///
/// - `Send + Sync + 'static` → a codec lives inside long-running actor
///   tasks that Tokio may move between worker threads.
/// - `Clone` → each component owns its own copy; codecs are expected to
///   be cheap (usually zero-sized) values.
pub trait Codec: Clone + Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if serialization fails.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the bytes are malformed,
    /// incomplete, or don't match the expected type.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] that uses JSON (via `serde_json`).
///
/// ## Example
///
/// ```rust
/// use rampart_protocol::{Codec, Frame, FrameKind, JsonCodec};
///
/// let codec = JsonCodec;
/// let frame = Frame::new(FrameKind::Heartbeat, b"1700000000".to_vec());
///
/// let bytes = codec.encode(&frame).unwrap();
/// let decoded: Frame = codec.decode(&bytes).unwrap();
/// assert_eq!(frame, decoded);
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}
