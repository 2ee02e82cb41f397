// src/models/question.rs

use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use sqlx::types::Json;

/// Closed set of question types. Choice types carry options; assignment and
/// recording types are submission-only and graded by a reviewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    MultipleChoice,
    TrueFalse,
    ShortText,
    TextAssignment,
    FileAssignment,
    VideoRecording,
    AudioRecording,
    MatchOrdering,
}

impl QuestionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionType::MultipleChoice => "multiple_choice",
            QuestionType::TrueFalse => "true_false",
            QuestionType::ShortText => "short_text",
            QuestionType::TextAssignment => "text_assignment",
            QuestionType::FileAssignment => "file_assignment",
            QuestionType::VideoRecording => "video_recording",
            QuestionType::AudioRecording => "audio_recording",
            QuestionType::MatchOrdering => "match_ordering",
        }
    }

    /// Types whose grading needs a human reviewer.
    pub fn is_manual(&self) -> bool {
        matches!(
            self,
            QuestionType::TextAssignment
                | QuestionType::FileAssignment
                | QuestionType::VideoRecording
                | QuestionType::AudioRecording
        )
    }

    /// Types answered by selecting stored options.
    pub fn is_choice(&self) -> bool {
        matches!(self, QuestionType::MultipleChoice | QuestionType::TrueFalse)
    }
}

impl TryFrom<String> for QuestionType {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "multiple_choice" => Ok(QuestionType::MultipleChoice),
            "true_false" => Ok(QuestionType::TrueFalse),
            "short_text" => Ok(QuestionType::ShortText),
            "text_assignment" => Ok(QuestionType::TextAssignment),
            "file_assignment" => Ok(QuestionType::FileAssignment),
            "video_recording" => Ok(QuestionType::VideoRecording),
            "audio_recording" => Ok(QuestionType::AudioRecording),
            "match_ordering" => Ok(QuestionType::MatchOrdering),
            other => Err(format!("unknown question type '{other}'")),
        }
    }
}

/// Current version of the `settings` JSONB payload.
pub const SETTINGS_VERSION: u32 = 1;

fn settings_version() -> u32 {
    SETTINGS_VERSION
}

/// Versioned per-type settings stored in `quiz_questions.settings`.
///
/// The schema is closed: every variant lists its fields explicitly so the
/// scoring engine never probes for optional keys.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionSettings {
    #[serde(default = "settings_version")]
    pub v: u32,
    #[serde(flatten)]
    pub config: QuestionConfig,
}

impl QuestionSettings {
    pub fn new(config: QuestionConfig) -> Self {
        Self {
            v: SETTINGS_VERSION,
            config,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QuestionConfig {
    MultipleChoice {
        /// When set, more than one option may be marked correct and the
        /// learner may select several; scoring stays exact-set match.
        #[serde(default)]
        multi_select: bool,
    },
    TrueFalse,
    ShortText {
        /// Reference answer compared case-insensitively. When neither this
        /// nor `pattern` is set the question awaits manual review.
        #[serde(default)]
        reference_answer: Option<String>,
        /// Regex alternative to the literal reference answer.
        #[serde(default)]
        pattern: Option<String>,
    },
    TextAssignment,
    FileAssignment,
    VideoRecording,
    AudioRecording,
    MatchOrdering,
}

/// Represents the 'quiz_questions' table in the database.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Question {
    pub id: i64,
    pub quiz_id: i64,
    pub prompt: String,
    #[sqlx(try_from = "String")]
    pub question_type: QuestionType,
    /// Order index, unique within a quiz.
    pub position: i32,
    pub points: f64,
    pub required: bool,
    pub media_url: Option<String>,
    pub settings: Json<QuestionSettings>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// Represents the 'quiz_question_options' table in the database.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct QuestionOption {
    pub id: i64,
    pub question_id: i64,
    pub content: String,
    pub media_url: Option<String>,
    pub is_correct: bool,
    pub position: i32,
}

/// Learner-facing option DTO: no correctness flag.
#[derive(Debug, Serialize)]
pub struct PublicOption {
    pub id: i64,
    pub content: String,
    pub media_url: Option<String>,
    pub position: i32,
}

impl From<QuestionOption> for PublicOption {
    fn from(o: QuestionOption) -> Self {
        Self {
            id: o.id,
            content: o.content,
            media_url: o.media_url,
            position: o.position,
        }
    }
}

/// Learner-facing question DTO: settings (reference answers) stay server-side.
#[derive(Debug, Serialize)]
pub struct PublicQuestion {
    pub id: i64,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    pub prompt: String,
    pub position: i32,
    pub points: f64,
    pub required: bool,
    pub media_url: Option<String>,
    pub options: Vec<PublicOption>,
}

/// Option payload inside question authoring requests.
#[derive(Debug, Clone, Deserialize)]
pub struct NewOption {
    pub content: String,
    #[serde(default)]
    pub media_url: Option<String>,
    #[serde(default)]
    pub is_correct: bool,
    #[serde(default)]
    pub position: i32,
}

/// Type-specific body of a question authoring request, tagged by `type`.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QuestionBody {
    MultipleChoice {
        options: Vec<NewOption>,
        #[serde(default)]
        multi_select: bool,
    },
    TrueFalse {
        options: Vec<NewOption>,
    },
    ShortText {
        #[serde(default)]
        reference_answer: Option<String>,
        #[serde(default)]
        pattern: Option<String>,
    },
    TextAssignment,
    FileAssignment,
    VideoRecording,
    AudioRecording,
    MatchOrdering {
        options: Vec<NewOption>,
    },
}

impl QuestionBody {
    pub fn question_type(&self) -> QuestionType {
        match self {
            QuestionBody::MultipleChoice { .. } => QuestionType::MultipleChoice,
            QuestionBody::TrueFalse { .. } => QuestionType::TrueFalse,
            QuestionBody::ShortText { .. } => QuestionType::ShortText,
            QuestionBody::TextAssignment => QuestionType::TextAssignment,
            QuestionBody::FileAssignment => QuestionType::FileAssignment,
            QuestionBody::VideoRecording => QuestionType::VideoRecording,
            QuestionBody::AudioRecording => QuestionType::AudioRecording,
            QuestionBody::MatchOrdering { .. } => QuestionType::MatchOrdering,
        }
    }

    pub fn options(&self) -> &[NewOption] {
        match self {
            QuestionBody::MultipleChoice { options, .. }
            | QuestionBody::TrueFalse { options }
            | QuestionBody::MatchOrdering { options } => options,
            _ => &[],
        }
    }

    pub fn settings(&self) -> QuestionSettings {
        let config = match self {
            QuestionBody::MultipleChoice { multi_select, .. } => QuestionConfig::MultipleChoice {
                multi_select: *multi_select,
            },
            QuestionBody::TrueFalse { .. } => QuestionConfig::TrueFalse,
            QuestionBody::ShortText {
                reference_answer,
                pattern,
            } => QuestionConfig::ShortText {
                reference_answer: reference_answer.clone(),
                pattern: pattern.clone(),
            },
            QuestionBody::TextAssignment => QuestionConfig::TextAssignment,
            QuestionBody::FileAssignment => QuestionConfig::FileAssignment,
            QuestionBody::VideoRecording => QuestionConfig::VideoRecording,
            QuestionBody::AudioRecording => QuestionConfig::AudioRecording,
            QuestionBody::MatchOrdering { .. } => QuestionConfig::MatchOrdering,
        };
        QuestionSettings::new(config)
    }

    /// Enforces the per-type authoring contract.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            QuestionBody::MultipleChoice {
                options,
                multi_select,
            } => {
                if options.len() < 2 {
                    return Err("multiple_choice requires at least 2 options".to_string());
                }
                let correct = options.iter().filter(|o| o.is_correct).count();
                if *multi_select {
                    if correct < 1 {
                        return Err(
                            "multi-select multiple_choice requires at least 1 correct option"
                                .to_string(),
                        );
                    }
                } else if correct != 1 {
                    return Err("multiple_choice requires exactly 1 correct option".to_string());
                }
            }
            QuestionBody::TrueFalse { options } => {
                if options.len() != 2 {
                    return Err("true_false requires exactly 2 options".to_string());
                }
                if options.iter().filter(|o| o.is_correct).count() != 1 {
                    return Err("true_false requires exactly 1 correct option".to_string());
                }
            }
            QuestionBody::ShortText { pattern, .. } => {
                if let Some(p) = pattern {
                    regex::Regex::new(p).map_err(|e| format!("invalid short_text pattern: {e}"))?;
                }
            }
            QuestionBody::MatchOrdering { options } => {
                if options.len() < 2 {
                    return Err("match_ordering requires at least 2 options".to_string());
                }
            }
            _ => {}
        }
        for opt in self.options() {
            if opt.content.is_empty() || opt.content.len() > 500 {
                return Err("option content must be between 1 and 500 characters".to_string());
            }
        }
        Ok(())
    }
}

fn default_points() -> f64 {
    1.0
}

/// DTO for creating a new question.
#[derive(Debug, Deserialize)]
pub struct CreateQuestionRequest {
    pub quiz_id: i64,
    pub prompt: String,
    pub position: i32,
    #[serde(default = "default_points")]
    pub points: f64,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub media_url: Option<String>,
    #[serde(flatten)]
    pub body: QuestionBody,
}

/// DTO for updating a question. The full definition (including options) is
/// replaced; partial patches of choice sets are too error-prone to score.
#[derive(Debug, Deserialize)]
pub struct UpdateQuestionRequest {
    pub prompt: String,
    pub position: i32,
    #[serde(default = "default_points")]
    pub points: f64,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub media_url: Option<String>,
    #[serde(flatten)]
    pub body: QuestionBody,
}

pub fn validate_question_fields(prompt: &str, points: f64) -> Result<(), String> {
    if prompt.is_empty() || prompt.len() > 2000 {
        return Err("prompt must be between 1 and 2000 characters".to_string());
    }
    if points < 0.0 {
        return Err("points must not be negative".to_string());
    }
    Ok(())
}
