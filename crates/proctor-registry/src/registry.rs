//! The session registry: tracks every quiz attempt on the server.
//!
//! This is the central table of the session layer. It's responsible for:
//! - Creating sessions (id + token generation, rate limiting)
//! - Enforcing one live connection binding per session
//! - Enforcing the global connection ceiling
//! - Validating tokens in constant time
//! - Applying the forward-only status transitions the engine requests
//!
//! # Concurrency note
//!
//! `SessionRegistry` is NOT thread-safe by itself — it uses plain
//! `HashMap`s, not concurrent ones. This is intentional: the registry is
//! shared behind a mutex at a higher level (the server state), and every
//! method here is a short, non-blocking critical section. Keeping it
//! simple here avoids hidden locking overhead.

use std::collections::{HashMap, HashSet};
use std::time::{Instant, SystemTime};

use proctor_protocol::{
    CompletionReason, QuizId, SessionId, SessionStatus, SessionToken,
};
use rand::Rng;

use crate::{RegistryConfig, RegistryError, SessionRecord};

/// Tracks all quiz sessions and their connection bindings.
///
/// ## Lifecycle
///
/// ```text
/// create() ──→ bind() ──→ begin() ──→ [ticks, navigation] ──→ complete()
///                │                                               │
///                ▼                                               ▼
///            unbind() ──→ bind()   (reconnect, same token)   [immutable]
/// ```
///
/// A session stays resumable across unbind/bind cycles — disconnecting
/// does not pause or destroy anything. Only completion makes it final.
pub struct SessionRegistry {
    /// All sessions, keyed by session id.
    sessions: HashMap<SessionId, SessionRecord>,

    /// Sessions that currently have a live connection. The invariant is
    /// at most one binding per session, so a set is enough.
    bound: HashSet<SessionId>,

    /// Per-caller creation timestamps inside the rate window.
    create_log: HashMap<String, Vec<Instant>>,

    /// Admission control configuration.
    config: RegistryConfig,
}

impl SessionRegistry {
    /// Creates a new, empty registry with the given config.
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            sessions: HashMap::new(),
            bound: HashSet::new(),
            create_log: HashMap::new(),
            config,
        }
    }

    // ---------------------------------------------------------------------
    // Creation
    // ---------------------------------------------------------------------

    /// Creates a new session for a quiz attempt.
    ///
    /// Generates an unguessable session id and an independent credential
    /// token. The token is returned here and ONLY here — subsequent reads
    /// of the session never expose it.
    ///
    /// `caller` keys the rate limit: a caller that created more than the
    /// configured number of sessions inside the window is rejected.
    ///
    /// # Errors
    /// Returns [`RegistryError::RateLimited`] when the caller exceeds
    /// the creation limit.
    pub fn create(
        &mut self,
        quiz_id: QuizId,
        student_name: Option<String>,
        caller: &str,
        time_limit_seconds: u32,
    ) -> Result<(SessionId, SessionToken), RegistryError> {
        self.check_create_rate(caller)?;

        let id = SessionId::new(format!("qs-{}", random_hex(16)));
        let token = SessionToken::new(random_hex(32));

        let record = SessionRecord {
            id: id.clone(),
            token: token.clone(),
            quiz_id,
            student_name,
            status: SessionStatus::NotStarted,
            time_remaining: time_limit_seconds,
            current_question: 1,
            created_at: SystemTime::now(),
            completion: None,
            score: None,
        };

        tracing::info!(session_id = %id, quiz_id = %record.quiz_id, "session created");
        self.sessions.insert(id.clone(), record);

        Ok((id, token))
    }

    /// Sliding-window rate limit: prune entries older than the window,
    /// then reject if the caller is at the limit.
    fn check_create_rate(&mut self, caller: &str) -> Result<(), RegistryError> {
        let now = Instant::now();
        let window = self.config.create_window;

        let log = self.create_log.entry(caller.to_string()).or_default();
        log.retain(|t| now.duration_since(*t) < window);

        if log.len() >= self.config.create_limit as usize {
            tracing::warn!(caller, "session creation rate limit hit");
            return Err(RegistryError::RateLimited);
        }
        log.push(now);
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Binding
    // ---------------------------------------------------------------------

    /// Attaches a connection to a session after validating its token.
    ///
    /// Check order: the session must exist, the token must match (compared
    /// in constant time, before anything about the session's state is
    /// revealed), the session must not be completed, no other connection
    /// may hold it, and the server must have binding capacity left.
    ///
    /// # Errors
    /// [`RegistryError::NotFound`], [`RegistryError::InvalidToken`],
    /// [`RegistryError::AlreadyCompleted`], [`RegistryError::AlreadyBound`],
    /// or [`RegistryError::CapacityExceeded`] — each mapping to a specific
    /// connection close code.
    pub fn bind(
        &mut self,
        id: &SessionId,
        token: &str,
    ) -> Result<&SessionRecord, RegistryError> {
        let session = self
            .sessions
            .get(id)
            .ok_or_else(|| RegistryError::NotFound(id.clone()))?;

        if !constant_time_eq(
            session.token.as_str().as_bytes(),
            token.as_bytes(),
        ) {
            return Err(RegistryError::InvalidToken);
        }

        if session.status.is_terminal() {
            return Err(RegistryError::AlreadyCompleted(id.clone()));
        }

        if self.bound.contains(id) {
            return Err(RegistryError::AlreadyBound(id.clone()));
        }

        if self.bound.len() >= self.config.max_bindings {
            tracing::warn!(
                bindings = self.bound.len(),
                "binding ceiling reached"
            );
            return Err(RegistryError::CapacityExceeded);
        }

        self.bound.insert(id.clone());
        tracing::info!(session_id = %id, "connection bound");

        // `expect` is safe here: we looked the session up above and
        // nothing in between removes it.
        Ok(self.sessions.get(id).expect("session just checked"))
    }

    /// Releases a session's connection binding.
    ///
    /// The session record and its countdown are untouched — time keeps
    /// running while the student is disconnected, and the session stays
    /// resumable with the same token.
    ///
    /// Returns `true` if a binding was actually released.
    pub fn unbind(&mut self, id: &SessionId) -> bool {
        let was_bound = self.bound.remove(id);
        if was_bound {
            tracing::info!(session_id = %id, "connection unbound");
        }
        was_bound
    }

    /// Whether a session currently has a live connection.
    pub fn is_bound(&self, id: &SessionId) -> bool {
        self.bound.contains(id)
    }

    /// Number of live connection bindings.
    pub fn binding_count(&self) -> usize {
        self.bound.len()
    }

    // ---------------------------------------------------------------------
    // Lookup
    // ---------------------------------------------------------------------

    /// Looks up a session by id.
    pub fn get(&self, id: &SessionId) -> Option<&SessionRecord> {
        self.sessions.get(id)
    }

    /// Returns the number of sessions (any status).
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Returns `true` if there are no sessions.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    // ---------------------------------------------------------------------
    // State transitions (called by the session engine only)
    // ---------------------------------------------------------------------

    /// Starts a session: `NotStarted → InProgress`, at question 1.
    ///
    /// # Errors
    /// [`RegistryError::InvalidState`] if the session was already started
    /// (or completed) — status never regresses.
    pub fn begin(
        &mut self,
        id: &SessionId,
    ) -> Result<&SessionRecord, RegistryError> {
        let session = self
            .sessions
            .get_mut(id)
            .ok_or_else(|| RegistryError::NotFound(id.clone()))?;

        if session.status != SessionStatus::NotStarted {
            return Err(RegistryError::InvalidState {
                id: id.clone(),
                status: session.status,
            });
        }

        session.status = SessionStatus::InProgress;
        session.current_question = 1;
        tracing::info!(session_id = %id, "quiz started");
        Ok(session)
    }

    /// Persists the countdown's latest value.
    ///
    /// `time_remaining` is non-increasing while in progress: a value
    /// larger than the stored one is clamped rather than applied (the
    /// countdown is the sole writer, so this only matters if a stale
    /// tick is delivered late).
    pub fn set_time_remaining(
        &mut self,
        id: &SessionId,
        remaining: u32,
    ) -> Result<(), RegistryError> {
        let session = self
            .sessions
            .get_mut(id)
            .ok_or_else(|| RegistryError::NotFound(id.clone()))?;

        if session.status != SessionStatus::InProgress {
            return Err(RegistryError::InvalidState {
                id: id.clone(),
                status: session.status,
            });
        }

        session.time_remaining = remaining.min(session.time_remaining);
        Ok(())
    }

    /// Updates which question the student is viewing. Range validation
    /// against the quiz's question count is the engine's job — the
    /// registry doesn't know quiz contents.
    pub fn set_current_question(
        &mut self,
        id: &SessionId,
        question_number: u32,
    ) -> Result<(), RegistryError> {
        let session = self
            .sessions
            .get_mut(id)
            .ok_or_else(|| RegistryError::NotFound(id.clone()))?;

        if session.status != SessionStatus::InProgress {
            return Err(RegistryError::InvalidState {
                id: id.clone(),
                status: session.status,
            });
        }

        session.current_question = question_number;
        Ok(())
    }

    /// Completes a session: `InProgress → Completed`, with the reason and
    /// final score. After this the record is immutable.
    ///
    /// # Errors
    /// [`RegistryError::InvalidState`] if the session isn't in progress —
    /// completing twice is a bug in the caller (the engine makes
    /// submission idempotent before ever reaching this).
    pub fn complete(
        &mut self,
        id: &SessionId,
        reason: CompletionReason,
        score: f64,
    ) -> Result<&SessionRecord, RegistryError> {
        let session = self
            .sessions
            .get_mut(id)
            .ok_or_else(|| RegistryError::NotFound(id.clone()))?;

        if session.status != SessionStatus::InProgress {
            return Err(RegistryError::InvalidState {
                id: id.clone(),
                status: session.status,
            });
        }

        session.status = SessionStatus::Completed;
        session.completion = Some(reason);
        session.score = Some(score);
        tracing::info!(session_id = %id, %reason, score, "session completed");
        Ok(session)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Generates a random lowercase hex string of `bytes * 2` characters.
///
/// Used for session ids (16 bytes = 128 bits) and tokens (32 bytes =
/// 256 bits). Enough entropy that guessing a valid value is
/// computationally infeasible.
fn random_hex(bytes: usize) -> String {
    let mut rng = rand::rng();
    (0..bytes)
        .map(|_| format!("{:02x}", rng.random::<u8>()))
        .collect()
}

/// Compares two byte strings without short-circuiting on the first
/// mismatch, so the comparison time doesn't leak how many leading bytes
/// of a guessed token were correct. The length check is the only
/// data-dependent branch, and token lengths are public.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

// =========================================================================
// Tests
// =========================================================================
