//! Error types for the protocol layer.
//!
//! Each crate in Proctor defines its own error enum. This keeps errors
//! specific and meaningful — a `ProtocolError` always means the problem is
//! in serialization/deserialization, not in networking or session state.

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust type into bytes).
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed (turning bytes into a Rust type).
    ///
    /// Common causes: malformed JSON, a missing required field, or a
    /// tagged message with an unknown `"type"`.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The message is invalid at the protocol level — it deserialized
    /// fine but violates protocol rules.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
