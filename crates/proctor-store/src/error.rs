//! Error types for the store layer.

use proctor_protocol::{QuestionId, QuizId};

/// Errors that can occur during store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A quiz with this id already exists. Quizzes are immutable once
    /// published, so inserts never overwrite.
    #[error("quiz {0} already exists")]
    DuplicateQuiz(QuizId),

    /// The quiz definition is internally inconsistent (wrong owner on a
    /// question, duplicate ordinals, a correct answer that isn't one of
    /// the options, ...).
    #[error("invalid quiz definition: {0}")]
    InvalidQuiz(String),

    /// No question with this id exists in any quiz.
    #[error("unknown question {0}")]
    UnknownQuestion(QuestionId),

    /// The backing datastore failed. Implementations over a real
    /// database wrap their driver errors here.
    #[error("storage backend error: {0}")]
    Backend(String),
}
