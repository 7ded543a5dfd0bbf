//! Session record types: the server's durable view of one quiz attempt.
//!
//! A "session" is one student's timed attempt at one quiz. The record
//! tracks:
//! - WHICH quiz is being taken and by whom
//! - WHERE the student is (`current_question`) and HOW LONG remains
//! - WHAT state the attempt is in (not started, in progress, completed)
//! - the secret token that authorizes attaching a connection

use std::time::{Duration, SystemTime};

use proctor_protocol::{
    CompletionReason, QuizId, SessionId, SessionSnapshot, SessionStatus,
    SessionToken,
};

// ---------------------------------------------------------------------------
// RegistryConfig
// ---------------------------------------------------------------------------

/// Configuration for the session registry's admission control.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Global ceiling on simultaneous connection bindings. Exceeding it
    /// rejects new bindings with `CapacityExceeded` — no silent queue.
    ///
    /// Default: 200.
    pub max_bindings: usize,

    /// Maximum session creations per caller within [`Self::create_window`].
    /// Exceeding it fails fast with `RateLimited`.
    ///
    /// Default: 30.
    pub create_limit: u32,

    /// The sliding window for the per-caller creation rate limit.
    ///
    /// Default: 60 seconds.
    pub create_window: Duration,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            max_bindings: 200,
            create_limit: 30,
            create_window: Duration::from_secs(60),
        }
    }
}

// ---------------------------------------------------------------------------
// SessionRecord
// ---------------------------------------------------------------------------

/// One student's attempt at a quiz, as the registry tracks it.
///
/// Created by [`SessionRegistry::create`](crate::SessionRegistry::create)
/// and mutated only through the registry's methods, which enforce the
/// forward-only status order. Exactly one record exists per attempt.
#[derive(Debug, Clone)]
pub struct SessionRecord {
    /// Opaque, unguessable session id.
    pub id: SessionId,

    /// The secret that authorizes attaching a connection. Independent of
    /// the id, returned exactly once at creation, and deliberately not
    /// `pub` — nothing outside the registry can re-read it.
    pub(crate) token: SessionToken,

    /// The quiz being attempted.
    pub quiz_id: QuizId,

    /// Student display name, if provided. Excluded from status views.
    pub student_name: Option<String>,

    /// Lifecycle state. Only advances forward.
    pub status: SessionStatus,

    /// Authoritative remaining time in seconds. Non-increasing while the
    /// session is in progress; reaching 0 completes it.
    pub time_remaining: u32,

    /// The 1-based question the student is currently viewing.
    pub current_question: u32,

    /// When the session was created.
    pub created_at: SystemTime,

    /// Why the session completed, once it has.
    pub completion: Option<CompletionReason>,

    /// Final score percentage, once completed.
    pub score: Option<f64>,
}

impl SessionRecord {
    /// The wire snapshot sent to a client on connect.
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            id: self.id.clone(),
            status: self.status,
            time_remaining: self.time_remaining,
            current_question: self.current_question,
        }
    }

    /// The unauthenticated status view: progress and score, but never
    /// the token or the student's name (privacy boundary).
    pub fn status_view(&self) -> SessionStatusView {
        SessionStatusView {
            id: self.id.clone(),
            quiz_id: self.quiz_id.clone(),
            status: self.status,
            time_remaining: self.time_remaining,
            current_question: self.current_question,
            completion: self.completion,
            score: self.score,
        }
    }
}

/// What an unauthenticated status read is allowed to see.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionStatusView {
    /// The session id.
    pub id: SessionId,
    /// The quiz being attempted.
    pub quiz_id: QuizId,
    /// Lifecycle state.
    pub status: SessionStatus,
    /// Remaining time in seconds.
    pub time_remaining: u32,
    /// Current 1-based question.
    pub current_question: u32,
    /// Completion reason, once completed.
    pub completion: Option<CompletionReason>,
    /// Final score percentage, once completed.
    pub score: Option<f64>,
}
