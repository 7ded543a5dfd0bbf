//! Codec trait and implementations for serializing/deserializing messages.
//!
//! A "codec" (coder/decoder) converts between Rust types and raw bytes.
//! The protocol layer doesn't care HOW messages are serialized — it just
//! needs something that implements the [`Codec`] trait, so the format can
//! be swapped without touching any other code.
//!
//! Currently we provide [`JsonCodec`] (human-readable, great for
//! debugging and for browser clients). A compact binary codec could be
//! added later behind its own feature flag.

use serde::{de::DeserializeOwned, Serialize};

use crate::ProtocolError;

/// A codec that can encode Rust types to bytes and decode bytes back.
///
/// `Send + Sync + 'static` because the codec is shared across the
/// per-connection tasks for the lifetime of the server.
///
/// The methods are generic: they work with any type that implements the
/// right serde trait. `DeserializeOwned` (vs plain `Deserialize`) means
/// the result doesn't borrow from the input bytes, so the receive buffer
/// can be dropped after decoding.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if serialization fails.
    fn encode<T: Serialize>(
        &self,
        value: &T,
    ) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the bytes are malformed,
    /// incomplete, or don't match the expected type — including a tagged
    /// message whose `"type"` the closed enum doesn't know.
    fn decode<T: DeserializeOwned>(
        &self,
        data: &[u8],
    ) -> Result<T, ProtocolError>;
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] that uses JSON (via `serde_json`).
///
/// JSON is what browser quiz clients speak natively, and messages can be
/// inspected in DevTools while debugging. This is behind the `json`
/// feature flag (enabled by default).
///
/// ## Example
///
/// ```rust
/// use proctor_protocol::{Codec, JsonCodec, ClientMessage};
///
/// let codec = JsonCodec;
///
/// let bytes = codec.encode(&ClientMessage::StartQuiz).unwrap();
/// let decoded: ClientMessage = codec.decode(&bytes).unwrap();
/// assert_eq!(decoded, ClientMessage::StartQuiz);
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(
        &self,
        value: &T,
    ) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(
        &self,
        data: &[u8],
    ) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}
