//! The scoring engine: a pure function from quiz + responses to a score.
//!
//! Scoring grades the FINAL recorded state, not first attempts — students
//! may revisit and change answers freely, and only what's on record when
//! the session completes counts. Unanswered questions count as incorrect
//! with zero earned points but still contribute to the possible total:
//! incompleteness is penalized, not excluded.
//!
//! Being a pure function makes scoring trivially deterministic: the same
//! questions and responses always produce the same report, no matter how
//! many times it runs.

use proctor_protocol::{QuestionResult, ScoreSummary};
use proctor_store::{Question, Response};

/// A full score report: the aggregate summary plus the per-question
/// breakdown, in question order.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreReport {
    /// Aggregate totals and grade.
    pub summary: ScoreSummary,
    /// One entry per quiz question, answered or not.
    pub results: Vec<QuestionResult>,
}

/// Scores a session's recorded responses against the quiz's questions.
///
/// `questions` is the full quiz in question order; `responses` is
/// whatever the session recorded (any order, correlated by question id).
/// Responses for questions outside the quiz are ignored — the state
/// machine prevents them from being recorded in the first place.
pub fn score_session(
    questions: &[Question],
    responses: &[Response],
) -> ScoreReport {
    let mut results = Vec::with_capacity(questions.len());
    let mut earned = 0u32;
    let mut possible = 0u32;
    let mut answered = 0u32;
    let mut correct = 0u32;

    for question in questions {
        possible += question.points;

        let response =
            responses.iter().find(|r| r.question_id == question.id);
        let is_correct = response
            .map(|r| r.answer == question.correct_answer)
            .unwrap_or(false);

        if response.is_some() {
            answered += 1;
        }
        if is_correct {
            earned += question.points;
            correct += 1;
        }

        results.push(QuestionResult {
            question_number: question.number,
            question_text: question.text.clone(),
            correct_answer: question.correct_answer.clone(),
            your_answer: response.map(|r| r.answer.clone()),
            is_correct,
            time_spent: response.map(|r| r.time_spent_seconds).unwrap_or(0),
        });
    }

    let percentage = if possible == 0 {
        0.0
    } else {
        f64::from(earned) / f64::from(possible) * 100.0
    };

    ScoreReport {
        summary: ScoreSummary {
            earned,
            possible,
            answered,
            correct,
            percentage,
            grade: letter_grade(percentage).to_string(),
        },
        results,
    }
}

/// Maps a percentage to a letter grade.
///
/// Thresholds: ≥90 A, ≥80 B, ≥70 C, ≥60 D, else F.
pub fn letter_grade(percentage: f64) -> &'static str {
    if percentage >= 90.0 {
        "A"
    } else if percentage >= 80.0 {
        "B"
    } else if percentage >= 70.0 {
        "C"
    } else if percentage >= 60.0 {
        "D"
    } else {
        "F"
    }
}

// =========================================================================
// Tests
// =========================================================================
