//! Core protocol types for Proctor's wire format.
//!
//! This module defines every type that travels "on the wire" — the
//! structures that get serialized to JSON, sent over the connection,
//! and deserialized on the other side.
//!
//! Think of this as the "language" that the quiz client and server speak.

use serde::{Deserialize, Serialize};

use std::fmt;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A unique identifier for a quiz.
///
/// This is a "newtype wrapper" around `String`. Why bother?
///
/// 1. **Type safety**: You can't accidentally pass a `SessionId` where a
///    `QuizId` is expected, even though both are strings underneath.
/// 2. **Readability**: `fn get_quiz(id: &QuizId)` is clearer than
///    `fn get_quiz(id: &str)`.
///
/// The `#[serde(transparent)]` attribute tells serde to serialize this as
/// just the inner string, not as `{ "0": "demo-quiz" }`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuizId(pub String);

impl QuizId {
    /// Creates a new `QuizId` from anything string-like.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a `&str`.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QuizId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A unique identifier for a question within a quiz.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuestionId(pub String);

impl QuestionId {
    /// Creates a new `QuestionId` from anything string-like.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a `&str`.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QuestionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A unique, unguessable identifier for one student's attempt at a quiz.
///
/// Session ids are generated server-side from random bytes. They identify
/// the session but do NOT authorize access to it — that's the
/// [`SessionToken`]'s job. The two are independent secrets: knowing a
/// session id alone must not let you attach to the session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl SessionId {
    /// Creates a new `SessionId` from anything string-like.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a `&str`.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The opaque credential bound to a session.
///
/// Issued exactly once, when the session is created. A client must present
/// it to attach a connection; the server never re-exposes it on status
/// reads. The token is a hex string with 256 bits of randomness — enough
/// that guessing a valid token is computationally infeasible.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionToken(pub String);

impl SessionToken {
    /// Creates a new `SessionToken` from anything string-like.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Returns the token as a `&str`.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// ---------------------------------------------------------------------------
// Session lifecycle
// ---------------------------------------------------------------------------

/// The lifecycle state of a quiz session.
///
/// This is a state machine with three states, and transitions only move
/// forward — a session never regresses:
///
/// ```text
/// NotStarted ──(start_quiz)──→ InProgress ──(submit / expiry)──→ Completed
/// ```
///
/// The wire form is snake_case: `"not_started"`, `"in_progress"`,
/// `"completed"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Session exists but the student hasn't pressed start yet.
    /// The timer is not running.
    NotStarted,

    /// The student is taking the quiz. The countdown is live and keeps
    /// running even while the student is disconnected.
    InProgress,

    /// The quiz ended (submitted or timed out). The session is immutable:
    /// no more answers, no more navigation, no new connections.
    Completed,
}

impl SessionStatus {
    /// The next state in the strict forward order, or `None` at the end.
    pub fn next(self) -> Option<Self> {
        match self {
            Self::NotStarted => Some(Self::InProgress),
            Self::InProgress => Some(Self::Completed),
            Self::Completed => None,
        }
    }

    /// Returns `true` if transitioning to `target` is valid.
    pub fn can_advance_to(self, target: Self) -> bool {
        self.next() == Some(target)
    }

    /// Returns `true` if the session accepts no further mutation.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotStarted => write!(f, "not_started"),
            Self::InProgress => write!(f, "in_progress"),
            Self::Completed => write!(f, "completed"),
        }
    }
}

/// Why a session completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionReason {
    /// The student submitted the quiz explicitly.
    Submitted,
    /// The countdown reached zero and the server auto-submitted.
    TimeExpired,
}

impl fmt::Display for CompletionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Submitted => write!(f, "submitted"),
            Self::TimeExpired => write!(f, "time_expired"),
        }
    }
}

// ---------------------------------------------------------------------------
// Message payloads
// ---------------------------------------------------------------------------

/// Quiz metadata sent to the client on connect. Never includes answers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizInfo {
    /// The quiz's unique id.
    pub id: QuizId,
    /// Human-readable title.
    pub title: String,
    /// Optional description shown before starting.
    pub description: Option<String>,
    /// Total time allowed for the quiz, in seconds.
    pub time_limit_seconds: u32,
    /// Number of questions in the quiz.
    pub question_count: u32,
}

/// A snapshot of the session's current state, sent on connect.
///
/// On reconnection this reflects whatever time and position accrued while
/// the client was away — the server's view is authoritative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    /// The session's id (never its token).
    pub id: SessionId,
    /// Current lifecycle state.
    pub status: SessionStatus,
    /// Authoritative remaining time in seconds.
    pub time_remaining: u32,
    /// The 1-based question the student is currently viewing.
    pub current_question: u32,
}

/// A question as shown to the student: text and options, but NOT the
/// correct answer. The correct answer only ever appears in
/// [`QuestionResult`], after the session has completed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionView {
    /// The question's id (used to submit an answer).
    pub id: QuestionId,
    /// Question text.
    pub text: String,
    /// The choices, in display order.
    pub options: Vec<String>,
}

/// Aggregate score for a completed session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreSummary {
    /// Points earned from correctly answered questions.
    pub earned: u32,
    /// Sum of point values over ALL questions, answered or not.
    pub possible: u32,
    /// How many questions received any answer.
    pub answered: u32,
    /// How many questions were answered correctly.
    pub correct: u32,
    /// `earned / possible * 100`, or 0 for an empty quiz.
    pub percentage: f64,
    /// Letter grade: ≥90 A, ≥80 B, ≥70 C, ≥60 D, else F.
    pub grade: String,
}

/// Per-question breakdown in the final results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionResult {
    /// 1-based question number.
    pub question_number: u32,
    /// Question text.
    pub question_text: String,
    /// The correct option. Safe to reveal — the session is over.
    pub correct_answer: String,
    /// The student's recorded answer, or `None` if unanswered.
    pub your_answer: Option<String>,
    /// Whether the recorded answer matched the correct one.
    /// Unanswered counts as incorrect.
    pub is_correct: bool,
    /// Cumulative seconds spent on this question.
    pub time_spent: u32,
}

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

/// Everything a client may send over the connection.
///
/// This is a *closed* set — representing the protocol as a tagged enum
/// (instead of open-ended dictionaries) means the compiler checks that
/// every handler matches every message type.
///
/// `#[serde(tag = "type", rename_all = "snake_case")]` produces the
/// internally tagged JSON the protocol specifies:
/// `{ "type": "answer", "question_id": "q1", "answer": "Paris" }`.
/// A message with an unknown `"type"` fails to deserialize, which the
/// gateway reports as an `error` message without closing the connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Begin the quiz: starts the countdown and shows question 1.
    StartQuiz,

    /// Record (or re-record) an answer for a question.
    Answer {
        question_id: QuestionId,
        answer: String,
    },

    /// Move to the next question.
    ///
    /// `current` is the client's idea of where it is. The server navigates
    /// from its own recorded position — the field is part of the wire
    /// contract but is not trusted.
    NextQuestion { current: u32 },

    /// Move to the previous question. Same `current` caveat as above.
    PrevQuestion { current: u32 },

    /// Jump directly to a question by 1-based number.
    GoToQuestion { question_number: u32 },

    /// Finish the quiz and request the final score.
    SubmitQuiz,
}

/// Everything the server may send over the connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// First message after a successful bind: quiz metadata plus the
    /// authoritative session snapshot.
    Connected {
        quiz: QuizInfo,
        session: SessionSnapshot,
    },

    /// A question to display, with the student's existing answer (if any)
    /// so revisited questions show their recorded choice.
    Question {
        question_number: u32,
        total_questions: u32,
        question: QuestionView,
        existing_answer: Option<String>,
    },

    /// One authoritative countdown decrement. Sent every second while the
    /// session is in progress and a connection is bound; ticks with no
    /// live connection are dropped, never queued.
    TimerTick { time_remaining: u32 },

    /// Acknowledges a recorded answer. `time_spent` is the seconds spent
    /// on the question since it was last shown (or last answered).
    AnswerReceived {
        question_id: QuestionId,
        time_spent: u32,
    },

    /// The final result. Sent once on completion, and re-sent verbatim if
    /// the client submits again (submission is idempotent).
    QuizComplete {
        reason: CompletionReason,
        score: ScoreSummary,
        results: Vec<QuestionResult>,
    },

    /// A protocol or validation error. The connection stays open and no
    /// session state changed.
    Error { message: String },
}

// ---------------------------------------------------------------------------
// Close reasons
// ---------------------------------------------------------------------------

/// Why the server refused (or closed) a connection, with its WebSocket
/// application close code.
///
/// These are authorization and capacity failures — unlike protocol errors,
/// they terminate the connection, and they do so *before* any session
/// state is read or mutated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// The presented token doesn't match the session's stored token,
    /// or no token was presented at all.
    InvalidToken,
    /// The session already completed; it accepts no new connections.
    AlreadyCompleted,
    /// No session exists with the requested id.
    NotFound,
    /// Another live connection already holds this session.
    AlreadyBound,
    /// The server's global connection ceiling is reached.
    CapacityExceeded,
}

impl CloseReason {
    /// The application close code sent in the close frame.
    pub fn code(&self) -> u16 {
        match self {
            Self::InvalidToken => 4001,
            Self::AlreadyCompleted => 4003,
            Self::NotFound => 4004,
            Self::AlreadyBound => 4009,
            Self::CapacityExceeded => 4029,
        }
    }
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidToken => write!(f, "invalid or missing token"),
            Self::AlreadyCompleted => write!(f, "session already completed"),
            Self::NotFound => write!(f, "session not found"),
            Self::AlreadyBound => write!(f, "session already connected"),
            Self::CapacityExceeded => write!(f, "server at capacity"),
        }
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    //! Tests for protocol types and their JSON serialization.
    //!
    //! The wire protocol defines exact JSON shapes. These tests verify
    //! that our serde attributes produce the correct format, because a
    //! mismatch means clients can't parse our messages.

    use super::*;

    // =====================================================================
    // Identity types
    // =====================================================================

    #[test]
    fn test_quiz_id_serializes_as_plain_string() {
        // `#[serde(transparent)]` means QuizId("demo") → `"demo"`,
        // not `{"0":"demo"}`.
        let json = serde_json::to_string(&QuizId::new("demo-quiz")).unwrap();
        assert_eq!(json, "\"demo-quiz\"");
    }

    #[test]
    fn test_session_id_round_trip() {
        let id = SessionId::new("qs-abc123");
        let json = serde_json::to_string(&id).unwrap();
        let decoded: SessionId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, decoded);
    }

    #[test]
    fn test_question_id_display() {
        assert_eq!(QuestionId::new("q7").to_string(), "q7");
    }

    // =====================================================================
    // SessionStatus
    // =====================================================================

    #[test]
    fn test_session_status_next_follows_strict_order() {
        assert_eq!(
            SessionStatus::NotStarted.next(),
            Some(SessionStatus::InProgress)
        );
        assert_eq!(
            SessionStatus::InProgress.next(),
            Some(SessionStatus::Completed)
        );
        assert_eq!(SessionStatus::Completed.next(), None);
    }

    #[test]
    fn test_session_status_can_advance_to() {
        assert!(
            SessionStatus::NotStarted.can_advance_to(SessionStatus::InProgress)
        );
        assert!(
            !SessionStatus::NotStarted.can_advance_to(SessionStatus::Completed)
        );
        // No regressions, ever.
        assert!(
            !SessionStatus::Completed.can_advance_to(SessionStatus::InProgress)
        );
        assert!(
            !SessionStatus::InProgress.can_advance_to(SessionStatus::NotStarted)
        );
    }

    #[test]
    fn test_session_status_serializes_as_snake_case() {
        let json = serde_json::to_string(&SessionStatus::NotStarted).unwrap();
        assert_eq!(json, "\"not_started\"");
        let json = serde_json::to_string(&SessionStatus::InProgress).unwrap();
        assert_eq!(json, "\"in_progress\"");
    }

    #[test]
    fn test_completion_reason_wire_form() {
        let json = serde_json::to_string(&CompletionReason::TimeExpired).unwrap();
        assert_eq!(json, "\"time_expired\"");
        assert_eq!(CompletionReason::Submitted.to_string(), "submitted");
    }

    // =====================================================================
    // ClientMessage — one test per variant to verify JSON shape
    // =====================================================================

    #[test]
    fn test_client_message_start_quiz_json_format() {
        // Unit variants carry only the tag.
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type": "start_quiz"}"#).unwrap();
        assert_eq!(msg, ClientMessage::StartQuiz);
    }

    #[test]
    fn test_client_message_answer_json_format() {
        let msg: ClientMessage = serde_json::from_str(
            r#"{"type": "answer", "question_id": "q1", "answer": "Paris"}"#,
        )
        .unwrap();
        assert_eq!(
            msg,
            ClientMessage::Answer {
                question_id: QuestionId::new("q1"),
                answer: "Paris".into(),
            }
        );
    }

    #[test]
    fn test_client_message_navigation_round_trip() {
        for msg in [
            ClientMessage::NextQuestion { current: 2 },
            ClientMessage::PrevQuestion { current: 2 },
            ClientMessage::GoToQuestion { question_number: 5 },
            ClientMessage::SubmitQuiz,
        ] {
            let bytes = serde_json::to_vec(&msg).unwrap();
            let decoded: ClientMessage = serde_json::from_slice(&bytes).unwrap();
            assert_eq!(msg, decoded);
        }
    }

    #[test]
    fn test_client_message_unknown_type_returns_error() {
        // The closed enum rejects message types it doesn't know.
        let unknown = r#"{"type": "pause_timer"}"#;
        let result: Result<ClientMessage, _> = serde_json::from_str(unknown);
        assert!(result.is_err());
    }

    #[test]
    fn test_client_message_missing_field_returns_error() {
        // Valid tag but missing a required field.
        let missing = r#"{"type": "answer", "question_id": "q1"}"#;
        let result: Result<ClientMessage, _> = serde_json::from_str(missing);
        assert!(result.is_err());
    }

    // =====================================================================
    // ServerMessage
    // =====================================================================

    #[test]
    fn test_server_message_timer_tick_json_format() {
        let msg = ServerMessage::TimerTick { time_remaining: 42 };
        let json: serde_json::Value = serde_json::to_value(&msg).unwrap();

        assert_eq!(json["type"], "timer_tick");
        assert_eq!(json["time_remaining"], 42);
    }

    #[test]
    fn test_server_message_question_hides_correct_answer() {
        // The question payload must never leak the correct answer:
        // its JSON carries exactly id, text, and options.
        let msg = ServerMessage::Question {
            question_number: 1,
            total_questions: 3,
            question: QuestionView {
                id: QuestionId::new("q1"),
                text: "Capital of France?".into(),
                options: vec!["Paris".into(), "Lyon".into()],
            },
            existing_answer: None,
        };
        let json: serde_json::Value = serde_json::to_value(&msg).unwrap();

        assert_eq!(json["type"], "question");
        let question = json["question"].as_object().unwrap();
        assert_eq!(question.len(), 3);
        assert!(question.contains_key("id"));
        assert!(question.contains_key("text"));
        assert!(question.contains_key("options"));
        assert!(json["existing_answer"].is_null());
    }

    #[test]
    fn test_server_message_connected_round_trip() {
        let msg = ServerMessage::Connected {
            quiz: QuizInfo {
                id: QuizId::new("demo-quiz"),
                title: "Demo".into(),
                description: None,
                time_limit_seconds: 300,
                question_count: 5,
            },
            session: SessionSnapshot {
                id: SessionId::new("qs-1"),
                status: SessionStatus::NotStarted,
                time_remaining: 300,
                current_question: 1,
            },
        };
        let bytes = serde_json::to_vec(&msg).unwrap();
        let decoded: ServerMessage = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(msg, decoded);
    }

    #[test]
    fn test_server_message_quiz_complete_json_format() {
        let msg = ServerMessage::QuizComplete {
            reason: CompletionReason::TimeExpired,
            score: ScoreSummary {
                earned: 0,
                possible: 2,
                answered: 0,
                correct: 0,
                percentage: 0.0,
                grade: "F".into(),
            },
            results: vec![],
        };
        let json: serde_json::Value = serde_json::to_value(&msg).unwrap();

        assert_eq!(json["type"], "quiz_complete");
        assert_eq!(json["reason"], "time_expired");
        assert_eq!(json["score"]["percentage"], 0.0);
        assert_eq!(json["score"]["grade"], "F");
    }

    #[test]
    fn test_server_message_error_round_trip() {
        let msg = ServerMessage::Error {
            message: "invalid answer".into(),
        };
        let bytes = serde_json::to_vec(&msg).unwrap();
        let decoded: ServerMessage = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(msg, decoded);
    }

    // =====================================================================
    // CloseReason
    // =====================================================================

    #[test]
    fn test_close_reason_codes() {
        assert_eq!(CloseReason::InvalidToken.code(), 4001);
        assert_eq!(CloseReason::AlreadyCompleted.code(), 4003);
        assert_eq!(CloseReason::NotFound.code(), 4004);
        assert_eq!(CloseReason::AlreadyBound.code(), 4009);
        assert_eq!(CloseReason::CapacityExceeded.code(), 4029);
    }

    #[test]
    fn test_close_reason_display() {
        assert_eq!(CloseReason::NotFound.to_string(), "session not found");
    }

    // =====================================================================
    // Error cases — malformed input
    // =====================================================================

    #[test]
    fn test_decode_garbage_returns_error() {
        let garbage = b"not json at all";
        let result: Result<ClientMessage, _> = serde_json::from_slice(garbage);
        assert!(result.is_err());
    }

    #[test]
    fn test_decode_untagged_object_returns_error() {
        // Valid JSON but no "type" tag.
        let wrong = r#"{"question_id": "q1"}"#;
        let result: Result<ClientMessage, _> = serde_json::from_str(wrong);
        assert!(result.is_err());
    }
}
