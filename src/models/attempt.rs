// src/models/attempt.rs

use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use sqlx::types::Json;

use crate::models::question::QuestionType;

/// Lifecycle state of an attempt.
///
/// `abandoned` is set by the expiry sweep only, never by a user call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    InProgress,
    Completed,
    Abandoned,
}

impl AttemptStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptStatus::InProgress => "in_progress",
            AttemptStatus::Completed => "completed",
            AttemptStatus::Abandoned => "abandoned",
        }
    }
}

impl TryFrom<String> for AttemptStatus {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "in_progress" => Ok(AttemptStatus::InProgress),
            "completed" => Ok(AttemptStatus::Completed),
            "abandoned" => Ok(AttemptStatus::Abandoned),
            other => Err(format!("unknown attempt status '{other}'")),
        }
    }
}

/// Represents the 'quiz_attempts' table in the database.
///
/// `quiz_id` is nullable: deleting a quiz orphans its historical attempts
/// instead of destroying them.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Attempt {
    pub id: i64,
    pub quiz_id: Option<i64>,
    pub user_id: i64,
    pub attempt_number: i32,
    #[sqlx(try_from = "String")]
    pub status: AttemptStatus,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
    pub last_activity_at: chrono::DateTime<chrono::Utc>,
    pub time_spent_seconds: i64,
    /// Completion arrived past the quiz's time limit. Flagged, not rejected:
    /// client-side timing cannot be the sole gate.
    pub overtime: bool,
    pub score: f64,
    pub max_score: f64,
    pub percentage: Option<f64>,
}

/// Represents the 'quiz_answers' table in the database.
/// Exactly one row per (attempt, question); resubmission replaces.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Answer {
    pub id: i64,
    pub attempt_id: i64,
    pub question_id: i64,
    pub selected_option_ids: Option<Json<Vec<i64>>>,
    pub answer_text: Option<String>,
    pub file_url: Option<String>,
    /// NULL until scored; stays NULL for submissions awaiting manual review.
    pub is_correct: Option<bool>,
    pub points_earned: f64,
    pub reviewer_feedback: Option<String>,
    pub submitted_at: chrono::DateTime<chrono::Utc>,
}

impl Answer {
    pub fn selected_ids(&self) -> &[i64] {
        self.selected_option_ids
            .as_ref()
            .map(|ids| ids.0.as_slice())
            .unwrap_or(&[])
    }
}

/// Tagged answer payload; the variant must match the question's type.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnswerPayload {
    /// multiple_choice / true_false
    Choice { selected_option_ids: Vec<i64> },
    /// short_text / text_assignment
    Text { text: String },
    /// file_assignment / video_recording / audio_recording
    File { file_url: String },
    /// match_ordering, in the learner's chosen order
    Ordering { ordered_option_ids: Vec<i64> },
}

impl AnswerPayload {
    pub fn matches(&self, question_type: QuestionType) -> bool {
        match self {
            AnswerPayload::Choice { .. } => question_type.is_choice(),
            AnswerPayload::Text { .. } => matches!(
                question_type,
                QuestionType::ShortText | QuestionType::TextAssignment
            ),
            AnswerPayload::File { .. } => matches!(
                question_type,
                QuestionType::FileAssignment
                    | QuestionType::VideoRecording
                    | QuestionType::AudioRecording
            ),
            AnswerPayload::Ordering { .. } => question_type == QuestionType::MatchOrdering,
        }
    }

    pub fn option_ids(&self) -> Option<&[i64]> {
        match self {
            AnswerPayload::Choice {
                selected_option_ids,
            } => Some(selected_option_ids),
            AnswerPayload::Ordering { ordered_option_ids } => Some(ordered_option_ids),
            _ => None,
        }
    }
}

/// DTO for submitting one answer into an in-progress attempt.
#[derive(Debug, Deserialize)]
pub struct SubmitAnswerRequest {
    pub question_id: i64,
    pub answer: AnswerPayload,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_kind_must_match_question_type() {
        let choice = AnswerPayload::Choice {
            selected_option_ids: vec![1],
        };
        assert!(choice.matches(QuestionType::MultipleChoice));
        assert!(choice.matches(QuestionType::TrueFalse));
        assert!(!choice.matches(QuestionType::ShortText));

        let text = AnswerPayload::Text {
            text: "foo".to_string(),
        };
        assert!(text.matches(QuestionType::ShortText));
        assert!(text.matches(QuestionType::TextAssignment));
        assert!(!text.matches(QuestionType::FileAssignment));

        let ordering = AnswerPayload::Ordering {
            ordered_option_ids: vec![3, 1, 2],
        };
        assert!(ordering.matches(QuestionType::MatchOrdering));
        assert!(!ordering.matches(QuestionType::MultipleChoice));
    }

    #[test]
    fn submit_answer_request_deserializes() {
        let json = serde_json::json!({
            "question_id": 7,
            "answer": {"kind": "choice", "selected_option_ids": [4, 5]}
        });
        let req: SubmitAnswerRequest = serde_json::from_value(json).unwrap();
        assert_eq!(req.question_id, 7);
        assert_eq!(req.answer.option_ids(), Some(&[4, 5][..]));
    }
}
