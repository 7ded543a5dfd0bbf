//! In-memory [`QuizStore`] implementation.
//!
//! Backs the demo server and the test suites. All state lives behind one
//! `RwLock` — the store is read-mostly (quiz lookups on every question
//! emit) with occasional short writes (response upserts), which is
//! exactly the access pattern `RwLock` is for.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::SystemTime;

use proctor_protocol::{QuestionId, QuizId, SessionId};
use tokio::sync::RwLock;

use crate::{Question, Quiz, QuizStore, QuizSummary, Response, StoreError};

#[derive(Default)]
struct Inner {
    quizzes: HashMap<QuizId, Quiz>,
    /// Questions per quiz, kept sorted by their 1-based number.
    questions: HashMap<QuizId, Vec<Question>>,
    /// Which quiz each question belongs to, for upsert validation.
    question_owner: HashMap<QuestionId, QuizId>,
    /// Responses keyed by session, then by question — the composite key
    /// that makes `record_response` an upsert.
    responses: HashMap<SessionId, HashMap<QuestionId, Response>>,
}

/// An in-memory quiz store.
///
/// Cheap to clone — all clones share the same state through an `Arc`.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<Inner>>,
}

impl MemoryStore {
    /// Creates a new, empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Publishes a quiz with its questions.
    ///
    /// Validates the definition before inserting: question ownership,
    /// unique ordinals, and that every correct answer is actually one of
    /// its question's options. Quizzes are immutable once published —
    /// a duplicate id is an error, not an overwrite.
    pub async fn insert_quiz(
        &self,
        quiz: Quiz,
        mut questions: Vec<Question>,
    ) -> Result<(), StoreError> {
        for q in &questions {
            if q.quiz_id != quiz.id {
                return Err(StoreError::InvalidQuiz(format!(
                    "question {} belongs to quiz {}, not {}",
                    q.id, q.quiz_id, quiz.id
                )));
            }
            if !q.has_option(&q.correct_answer) {
                return Err(StoreError::InvalidQuiz(format!(
                    "question {}: correct answer is not one of its options",
                    q.id
                )));
            }
        }

        questions.sort_by_key(|q| q.number);
        if questions.windows(2).any(|w| w[0].number == w[1].number) {
            return Err(StoreError::InvalidQuiz(format!(
                "quiz {}: duplicate question numbers",
                quiz.id
            )));
        }

        let mut inner = self.inner.write().await;
        if inner.quizzes.contains_key(&quiz.id) {
            return Err(StoreError::DuplicateQuiz(quiz.id));
        }

        for q in &questions {
            inner.question_owner.insert(q.id.clone(), quiz.id.clone());
        }
        tracing::info!(
            quiz_id = %quiz.id,
            questions = questions.len(),
            "quiz published"
        );
        inner.questions.insert(quiz.id.clone(), questions);
        inner.quizzes.insert(quiz.id.clone(), quiz);
        Ok(())
    }

    /// Publishes the built-in sample quiz (id `demo-quiz`) if it isn't
    /// there yet. Used by the demo server so there's something to take.
    pub async fn seed_sample_quiz(&self) -> Result<(), StoreError> {
        let quiz_id = QuizId::new("demo-quiz");
        if self.get_quiz(&quiz_id).await?.is_some() {
            return Ok(());
        }

        let quiz = Quiz {
            id: quiz_id.clone(),
            title: "Rust Fundamentals Quiz".into(),
            description: Some("Test your Rust knowledge!".into()),
            time_limit_seconds: 300, // 5 minutes
        };

        let raw: [(&str, &str, [&str; 4], &str); 5] = [
            (
                "q1",
                "Which keyword declares an immutable binding in Rust?",
                ["var", "let", "const fn", "static mut"],
                "let",
            ),
            (
                "q2",
                "What does the ? operator do in a function returning Result?",
                [
                    "Panics on Err",
                    "Ignores the error",
                    "Returns the error to the caller",
                    "Retries the operation",
                ],
                "Returns the error to the caller",
            ),
            (
                "q3",
                "Which type owns a heap-allocated, growable string?",
                ["&str", "String", "char", "str"],
                "String",
            ),
            (
                "q4",
                "What does Vec::get return for an out-of-bounds index?",
                ["A panic", "undefined behavior", "None", "An empty value"],
                "None",
            ),
            (
                "q5",
                "How many mutable references to a value may exist at once?",
                ["One", "Two", "Any number", "Zero"],
                "One",
            ),
        ];

        let questions = raw
            .iter()
            .enumerate()
            .map(|(i, (id, text, options, answer))| Question {
                id: QuestionId::new(*id),
                quiz_id: quiz_id.clone(),
                number: i as u32 + 1,
                text: (*text).into(),
                options: options.iter().map(|o| (*o).to_string()).collect(),
                correct_answer: (*answer).into(),
                points: 1,
            })
            .collect();

        self.insert_quiz(quiz, questions).await
    }
}

impl QuizStore for MemoryStore {
    async fn list_quizzes(&self) -> Result<Vec<QuizSummary>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .quizzes
            .values()
            .map(|quiz| QuizSummary {
                id: quiz.id.clone(),
                title: quiz.title.clone(),
                description: quiz.description.clone(),
                time_limit_seconds: quiz.time_limit_seconds,
                question_count: inner
                    .questions
                    .get(&quiz.id)
                    .map(|qs| qs.len() as u32)
                    .unwrap_or(0),
            })
            .collect())
    }

    async fn get_quiz(&self, id: &QuizId) -> Result<Option<Quiz>, StoreError> {
        Ok(self.inner.read().await.quizzes.get(id).cloned())
    }

    async fn get_questions(
        &self,
        quiz_id: &QuizId,
    ) -> Result<Vec<Question>, StoreError> {
        Ok(self
            .inner
            .read()
            .await
            .questions
            .get(quiz_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn record_response(
        &self,
        session_id: &SessionId,
        question_id: &QuestionId,
        answer: &str,
        time_spent: u32,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;

        if !inner.question_owner.contains_key(question_id) {
            return Err(StoreError::UnknownQuestion(question_id.clone()));
        }

        let now = SystemTime::now();
        inner
            .responses
            .entry(session_id.clone())
            .or_default()
            .entry(question_id.clone())
            .and_modify(|r| {
                // Upsert: replace the answer, accumulate the time.
                r.answer = answer.to_string();
                r.time_spent_seconds += time_spent;
                r.answered_at = now;
            })
            .or_insert_with(|| Response {
                session_id: session_id.clone(),
                question_id: question_id.clone(),
                answer: answer.to_string(),
                time_spent_seconds: time_spent,
                answered_at: now,
            });

        tracing::debug!(%session_id, %question_id, "response recorded");
        Ok(())
    }

    async fn get_responses(
        &self,
        session_id: &SessionId,
    ) -> Result<Vec<Response>, StoreError> {
        Ok(self
            .inner
            .read()
            .await
            .responses
            .get(session_id)
            .map(|by_question| by_question.values().cloned().collect())
            .unwrap_or_default())
    }
}

// =========================================================================
// Tests
// =========================================================================
