//! Error types for the engine layer.
//!
//! Note the split: these errors are for *callers* of the engine (the
//! gateway, mostly). Validation failures on client actions — a bad
//! question id, an out-of-range navigation — are not errors at this
//! level; the session actor reports those to the client as `error`
//! messages and leaves state untouched.

use proctor_protocol::{QuizId, SessionId};
use proctor_store::StoreError;

/// Errors that can occur when operating the session engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The session's quiz doesn't exist in the store.
    #[error("quiz {0} not found")]
    QuizNotFound(QuizId),

    /// No session record exists for this id.
    #[error("session {0} not found")]
    SessionNotFound(SessionId),

    /// The session's actor is gone (its command channel closed).
    #[error("session {0} is unavailable")]
    Unavailable(SessionId),

    /// A store operation failed while setting up a session actor.
    #[error(transparent)]
    Store(#[from] StoreError),
}
