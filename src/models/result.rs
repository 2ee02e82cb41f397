// src/models/result.rs

use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;

use crate::models::attempt::AttemptStatus;
use crate::models::question::QuestionType;

/// Represents the 'quiz_results' table: the denormalized summary written once
/// when an attempt completes. The admin regrade path is the only writer that
/// may touch it afterwards.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct QuizResult {
    pub id: i64,
    pub attempt_id: i64,
    /// Kept even after the quiz itself is deleted; may dangle.
    pub quiz_id: Option<i64>,
    pub total_questions: i32,
    pub correct_count: i32,
    pub incorrect_count: i32,
    pub skipped_count: i32,
    /// True while any submitted answer still awaits manual grading.
    pub requires_review: bool,
    pub score: f64,
    pub max_score: f64,
    /// NULL until a percentage is computable (see scoring engine).
    pub percentage: Option<f64>,
    pub passed: bool,
    pub feedback: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Scoring summary block of a result response.
#[derive(Debug, Serialize)]
pub struct ResultSummary {
    pub total_questions: i32,
    pub correct_count: i32,
    pub incorrect_count: i32,
    pub skipped_count: i32,
    pub requires_review: bool,
    pub score: f64,
    pub max_score: f64,
    pub percentage: Option<f64>,
    pub passed: bool,
    pub feedback: Option<String>,
}

impl From<QuizResult> for ResultSummary {
    fn from(r: QuizResult) -> Self {
        Self {
            total_questions: r.total_questions,
            correct_count: r.correct_count,
            incorrect_count: r.incorrect_count,
            skipped_count: r.skipped_count,
            requires_review: r.requires_review,
            score: r.score,
            max_score: r.max_score,
            percentage: r.percentage,
            passed: r.passed,
            feedback: r.feedback,
        }
    }
}

/// One answered question in the result review. `correct_option_ids` and
/// `reference_answer` are present only when the caller may see correctness
/// data (admin, or show_correct_answers on the quiz).
#[derive(Debug, Serialize)]
pub struct AnswerReview {
    pub question_id: i64,
    /// Id of the stored answer row, if one was submitted; graders address
    /// answers by this id.
    pub answer_id: Option<i64>,
    pub prompt: String,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    pub points_possible: f64,
    pub selected_option_ids: Option<Vec<i64>>,
    pub answer_text: Option<String>,
    pub file_url: Option<String>,
    pub is_correct: Option<bool>,
    pub points_earned: f64,
    pub reviewer_feedback: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correct_option_ids: Option<Vec<i64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_answer: Option<String>,
}

/// Full response of `GET /api/attempts/{id}/result`.
///
/// `result` is omitted for learners when the quiz hides results;
/// `review` is omitted alongside it.
#[derive(Debug, Serialize)]
pub struct ResultResponse {
    pub attempt_id: i64,
    pub attempt_number: i32,
    pub status: AttemptStatus,
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
    pub time_spent_seconds: i64,
    pub overtime: bool,
    pub results_visible: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ResultSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub review: Option<Vec<AnswerReview>>,
}

/// DTO for a reviewer grading one manually-graded answer.
#[derive(Debug, Deserialize)]
pub struct GradeAnswerRequest {
    pub is_correct: bool,
    pub points_earned: f64,
    pub feedback: Option<String>,
}
