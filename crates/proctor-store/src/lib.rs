//! Quiz and response storage for Proctor.
//!
//! This crate defines the datastore boundary of the quiz runtime:
//!
//! 1. **Read-only quiz access** — published quizzes and their questions
//!    ([`QuizStore::get_quiz`], [`QuizStore::get_questions`])
//! 2. **Append-only response writes** — students' answers, upserted by
//!    `(session_id, question_id)` ([`QuizStore::record_response`])
//!
//! The runtime only ever talks to the [`QuizStore`] trait; the bundled
//! [`MemoryStore`] keeps everything in memory and is what the demo and
//! the tests use. A SQL-backed implementation would slot in the same way.
//!
//! # How it fits in the stack
//!
//! ```text
//! Engine (above)  ← reads quizzes, upserts responses while a quiz runs
//!     ↕
//! Store (this crate)  ← owns the quiz/question/response records
//! ```

mod error;
mod memory;
mod types;

pub use error::StoreError;
pub use memory::MemoryStore;
pub use types::{Question, Quiz, QuizSummary, Response};

use std::future::Future;

use proctor_protocol::{QuestionId, QuizId, SessionId};

/// The datastore contract the quiz runtime is written against.
///
/// # Trait bounds
///
/// - `Send + Sync + 'static` → store handles are shared across the
///   per-session and per-connection tasks for the life of the server.
/// - `Clone` → every session actor holds its own handle. Implementations
///   are expected to be cheap clones over shared state (an `Arc`, a
///   connection pool).
///
/// The methods return explicit `impl Future + Send` (instead of
/// `async fn` sugar) so the futures can be awaited inside spawned tasks.
pub trait QuizStore: Send + Sync + Clone + 'static {
    /// Lists all published quizzes.
    fn list_quizzes(
        &self,
    ) -> impl Future<Output = Result<Vec<QuizSummary>, StoreError>> + Send;

    /// Fetches a quiz by id. `Ok(None)` if it doesn't exist.
    fn get_quiz(
        &self,
        id: &QuizId,
    ) -> impl Future<Output = Result<Option<Quiz>, StoreError>> + Send;

    /// Returns a quiz's questions ordered by their 1-based number.
    /// An unknown quiz id yields an empty list.
    fn get_questions(
        &self,
        quiz_id: &QuizId,
    ) -> impl Future<Output = Result<Vec<Question>, StoreError>> + Send;

    /// Records a student's answer — an upsert keyed by
    /// `(session_id, question_id)`. Re-answering replaces the stored
    /// option and accumulates `time_spent` onto the existing total.
    ///
    /// # Errors
    /// [`StoreError::UnknownQuestion`] if no such question exists.
    fn record_response(
        &self,
        session_id: &SessionId,
        question_id: &QuestionId,
        answer: &str,
        time_spent: u32,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Returns all responses recorded for a session, in no particular
    /// order — callers correlate by question id.
    fn get_responses(
        &self,
        session_id: &SessionId,
    ) -> impl Future<Output = Result<Vec<Response>, StoreError>> + Send;
}
