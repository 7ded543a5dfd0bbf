//! Record types for quizzes, questions, and responses.
//!
//! Quizzes and questions are immutable once inserted — the store offers
//! read-only access to them. Responses are the only thing the quiz
//! runtime writes, and they are upserted, never deleted.

use std::time::SystemTime;

use proctor_protocol::{QuestionId, QuizId, SessionId};
use serde::{Deserialize, Serialize};

/// A published quiz. Immutable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quiz {
    /// Unique quiz id.
    pub id: QuizId,
    /// Human-readable title.
    pub title: String,
    /// Optional description.
    pub description: Option<String>,
    /// Time allowed for one attempt, in seconds. Sessions inherit this
    /// as their starting `time_remaining`.
    pub time_limit_seconds: u32,
}

/// One question of a quiz. Immutable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    /// Unique question id.
    pub id: QuestionId,
    /// The quiz this question belongs to.
    pub quiz_id: QuizId,
    /// 1-based ordinal position, unique within the quiz.
    pub number: u32,
    /// Question text.
    pub text: String,
    /// The choices, in display order.
    pub options: Vec<String>,
    /// The correct option. Must be one of `options`.
    pub correct_answer: String,
    /// Point value (default 1).
    pub points: u32,
}

impl Question {
    /// Returns `true` if `answer` is one of this question's options.
    pub fn has_option(&self, answer: &str) -> bool {
        self.options.iter().any(|o| o == answer)
    }
}

/// A student's recorded answer to one question.
///
/// Keyed by `(session_id, question_id)` — re-answering the same question
/// updates this record in place. `time_spent_seconds` accumulates across
/// re-answers; `answer` is replaced.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    /// The session this response belongs to.
    pub session_id: SessionId,
    /// The question answered.
    pub question_id: QuestionId,
    /// The selected option.
    pub answer: String,
    /// Cumulative seconds spent on this question.
    pub time_spent_seconds: u32,
    /// When the answer was last recorded.
    pub answered_at: SystemTime,
}

/// Quiz metadata for listings — everything but the questions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizSummary {
    /// Unique quiz id.
    pub id: QuizId,
    /// Human-readable title.
    pub title: String,
    /// Optional description.
    pub description: Option<String>,
    /// Time allowed for one attempt, in seconds.
    pub time_limit_seconds: u32,
    /// Number of questions.
    pub question_count: u32,
}
