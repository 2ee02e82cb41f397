// src/models/quiz.rs

use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use validator::Validate;

use crate::config::{DEFAULT_MAX_ATTEMPTS, DEFAULT_PASSING_SCORE};

/// Publication status of a quiz. Learners only ever see `active` quizzes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuizStatus {
    Draft,
    Active,
}

impl QuizStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuizStatus::Draft => "draft",
            QuizStatus::Active => "active",
        }
    }
}

impl TryFrom<String> for QuizStatus {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "draft" => Ok(QuizStatus::Draft),
            "active" => Ok(QuizStatus::Active),
            other => Err(format!("unknown quiz status '{other}'")),
        }
    }
}

/// Represents the 'quizzes' table in the database.
///
/// `lesson_id` and `course_id` reference entities owned by the catalog
/// service; this domain stores the ids only.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Quiz {
    pub id: i64,
    pub lesson_id: i64,
    pub course_id: Option<i64>,
    pub title: String,
    pub description: Option<String>,
    pub instructions: Option<String>,
    /// Suggested time limit in minutes; completion past it is flagged, not
    /// rejected.
    pub time_limit_minutes: Option<i32>,
    pub passing_score: f64,
    pub max_attempts: i32,
    pub shuffle_questions: bool,
    pub show_correct_answers: bool,
    pub show_results: bool,
    #[sqlx(try_from = "String")]
    pub status: QuizStatus,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

fn default_passing_score() -> f64 {
    DEFAULT_PASSING_SCORE
}

fn default_max_attempts() -> i32 {
    DEFAULT_MAX_ATTEMPTS
}

fn default_show_results() -> bool {
    true
}

/// DTO for creating a new quiz.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateQuizRequest {
    pub lesson_id: i64,
    pub course_id: Option<i64>,
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(max = 5000))]
    pub description: Option<String>,
    #[validate(length(max = 5000))]
    pub instructions: Option<String>,
    #[validate(range(min = 1))]
    pub time_limit_minutes: Option<i32>,
    #[serde(default = "default_passing_score")]
    #[validate(range(min = 0.0, max = 100.0))]
    pub passing_score: f64,
    #[serde(default = "default_max_attempts")]
    #[validate(range(min = 1))]
    pub max_attempts: i32,
    #[serde(default)]
    pub shuffle_questions: bool,
    #[serde(default)]
    pub show_correct_answers: bool,
    #[serde(default = "default_show_results")]
    pub show_results: bool,
}

/// DTO for updating a quiz. Fields are optional; absent fields are left
/// untouched. Status changes go through publish/unpublish instead.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateQuizRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    #[validate(length(max = 5000))]
    pub description: Option<String>,
    #[validate(length(max = 5000))]
    pub instructions: Option<String>,
    #[validate(range(min = 1))]
    pub time_limit_minutes: Option<i32>,
    #[validate(range(min = 0.0, max = 100.0))]
    pub passing_score: Option<f64>,
    #[validate(range(min = 1))]
    pub max_attempts: Option<i32>,
    pub shuffle_questions: Option<bool>,
    pub show_correct_answers: Option<bool>,
    pub show_results: Option<bool>,
}

impl UpdateQuizRequest {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.instructions.is_none()
            && self.time_limit_minutes.is_none()
            && self.passing_score.is_none()
            && self.max_attempts.is_none()
            && self.shuffle_questions.is_none()
            && self.show_correct_answers.is_none()
            && self.show_results.is_none()
    }
}
