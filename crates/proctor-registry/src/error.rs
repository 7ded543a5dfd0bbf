//! Error types for the registry layer.

use proctor_protocol::{CloseReason, SessionId, SessionStatus};

/// Errors that can occur during session registry operations.
///
/// The bind failures map one-to-one onto connection close codes — see
/// [`RegistryError::close_reason`].
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// No session exists with this id.
    #[error("session {0} not found")]
    NotFound(SessionId),

    /// The presented token doesn't match the session's stored token.
    /// Could be a stale token, a typo, or a guessing attempt.
    #[error("invalid session token")]
    InvalidToken,

    /// The session already completed; it accepts no new bindings.
    #[error("session {0} already completed")]
    AlreadyCompleted(SessionId),

    /// Another live connection already holds this session. The second
    /// attempt is rejected, not queued — the first connection wins.
    #[error("session {0} already has a live connection")]
    AlreadyBound(SessionId),

    /// The global binding ceiling is reached.
    #[error("connection capacity exceeded")]
    CapacityExceeded,

    /// This caller created too many sessions in the rate window.
    #[error("session creation rate limit exceeded")]
    RateLimited,

    /// The session is in a state that doesn't allow this operation —
    /// e.g. starting a quiz that's already in progress. Status only
    /// moves forward.
    #[error("session {id}: invalid transition from {status}")]
    InvalidState {
        id: SessionId,
        status: SessionStatus,
    },
}

impl RegistryError {
    /// The connection close reason for a failed bind, if this error is
    /// one a client connection can be refused with.
    pub fn close_reason(&self) -> Option<CloseReason> {
        match self {
            Self::NotFound(_) => Some(CloseReason::NotFound),
            Self::InvalidToken => Some(CloseReason::InvalidToken),
            Self::AlreadyCompleted(_) => Some(CloseReason::AlreadyCompleted),
            Self::AlreadyBound(_) => Some(CloseReason::AlreadyBound),
            Self::CapacityExceeded => Some(CloseReason::CapacityExceeded),
            Self::RateLimited | Self::InvalidState { .. } => None,
        }
    }
}
