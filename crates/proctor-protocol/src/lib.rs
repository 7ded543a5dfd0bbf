//! Wire protocol for Proctor.
//!
//! This crate defines the "language" that quiz clients and the server
//! speak:
//!
//! - **Types** ([`ClientMessage`], [`ServerMessage`], [`CloseReason`],
//!   id newtypes) — the message structures that travel on the wire.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]) — how those messages are
//!   converted to/from bytes.
//! - **Errors** ([`ProtocolError`]) — what can go wrong during
//!   encoding/decoding.
//!
//! # Architecture
//!
//! The protocol layer sits between transport (raw bytes) and the session
//! engine (quiz state). It doesn't know about connections or timers — it
//! only knows how to represent and serialize messages.
//!
//! ```text
//! Transport (bytes) → Protocol (messages) → Engine (session state)
//! ```

mod codec;
mod error;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{
    ClientMessage, CloseReason, CompletionReason, QuestionId, QuestionResult,
    QuestionView, QuizId, QuizInfo, ScoreSummary, ServerMessage, SessionId,
    SessionSnapshot, SessionStatus, SessionToken,
};
