// src/scoring.rs

use std::collections::{HashMap, HashSet};

use crate::models::attempt::Answer;
use crate::models::question::{Question, QuestionConfig, QuestionOption, QuestionType};

/// Scoring outcome for one answered question, written back onto the answer
/// row when the attempt completes.
#[derive(Debug, Clone)]
pub struct GradedAnswer {
    pub question_id: i64,
    /// None = awaiting manual review.
    pub is_correct: Option<bool>,
    pub points_earned: f64,
}

/// Aggregate outcome of scoring one attempt.
#[derive(Debug, Clone)]
pub struct ScoreSummary {
    pub total_questions: i32,
    pub correct_count: i32,
    pub incorrect_count: i32,
    pub skipped_count: i32,
    pub requires_review: bool,
    pub score: f64,
    pub max_score: f64,
    pub percentage: Option<f64>,
    pub passed: bool,
    pub graded: Vec<GradedAnswer>,
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Scores a closed attempt. Pure: takes the quiz's questions and options plus
/// the attempt's answers, returns the summary without touching storage.
///
/// Resilience rules:
/// - a question without an answer is skipped (0 points);
/// - an answer whose question no longer exists is ignored, never an error;
/// - manually-graded answers keep their reviewer-assigned grade, or stay
///   ungraded (`is_correct = None`) until a reviewer acts.
pub fn score_attempt(
    passing_score: f64,
    questions: &[Question],
    options: &[QuestionOption],
    answers: &[Answer],
) -> ScoreSummary {
    let mut options_by_question: HashMap<i64, Vec<&QuestionOption>> = HashMap::new();
    for opt in options {
        options_by_question.entry(opt.question_id).or_default().push(opt);
    }

    let answers_by_question: HashMap<i64, &Answer> =
        answers.iter().map(|a| (a.question_id, a)).collect();

    let mut correct_count = 0;
    let mut incorrect_count = 0;
    let mut skipped_count = 0;
    let mut requires_review = false;
    let mut score = 0.0;
    let mut max_score = 0.0;
    let mut graded = Vec::new();

    for question in questions {
        max_score += question.points;

        let Some(answer) = answers_by_question.get(&question.id) else {
            skipped_count += 1;
            continue;
        };

        let opts = options_by_question
            .get(&question.id)
            .map(Vec::as_slice)
            .unwrap_or(&[]);

        let outcome = grade_one(question, opts, answer);
        match outcome.is_correct {
            Some(true) => correct_count += 1,
            Some(false) => incorrect_count += 1,
            None => requires_review = true,
        }
        score += outcome.points_earned;
        graded.push(outcome);
    }

    let total_questions = questions.len() as i32;

    let percentage = if max_score > 0.0 {
        Some(round2(score / max_score * 100.0))
    } else if total_questions > 0 && !requires_review {
        // Zero-weight quiz: once every answer has a definite grade, fall back
        // to counting questions so a percentage still exists.
        Some(round2(f64::from(correct_count) / f64::from(total_questions) * 100.0))
    } else {
        None
    };

    let passed = percentage.map(|p| p >= passing_score).unwrap_or(false);

    ScoreSummary {
        total_questions,
        correct_count,
        incorrect_count,
        skipped_count,
        requires_review,
        score,
        max_score,
        percentage,
        passed,
        graded,
    }
}

/// Applies the type-specific correctness rule to a single answer.
fn grade_one(question: &Question, options: &[&QuestionOption], answer: &Answer) -> GradedAnswer {
    let correct = match question.question_type {
        QuestionType::MultipleChoice | QuestionType::TrueFalse => {
            // Exact set match; no partial credit.
            let correct_ids: HashSet<i64> =
                options.iter().filter(|o| o.is_correct).map(|o| o.id).collect();
            let selected_ids: HashSet<i64> = answer.selected_ids().iter().copied().collect();
            Some(!correct_ids.is_empty() && selected_ids == correct_ids)
        }
        QuestionType::MatchOrdering => {
            // Exact positional match against the authored order.
            let mut ordered: Vec<&&QuestionOption> = options.iter().collect();
            ordered.sort_by_key(|o| o.position);
            let expected: Vec<i64> = ordered.iter().map(|o| o.id).collect();
            Some(!expected.is_empty() && answer.selected_ids() == expected.as_slice())
        }
        QuestionType::ShortText => grade_short_text(question, answer),
        QuestionType::TextAssignment
        | QuestionType::FileAssignment
        | QuestionType::VideoRecording
        | QuestionType::AudioRecording => answer.is_correct,
    };

    let points_earned = match correct {
        Some(true) if !question.question_type.is_manual() => question.points,
        Some(false) if !question.question_type.is_manual() => 0.0,
        // Manually graded (or reviewer-overridden short_text): keep the
        // reviewer's points, bounded by the question's worth.
        Some(_) => {
            if question.points > 0.0 {
                answer.points_earned.clamp(0.0, question.points)
            } else {
                answer.points_earned.max(0.0)
            }
        }
        None => 0.0,
    };

    GradedAnswer {
        question_id: question.id,
        is_correct: correct,
        points_earned,
    }
}

/// Short-text rule: pattern match when configured, else case-insensitive
/// comparison with the reference answer, else fall through to any stored
/// reviewer grade (None while ungraded).
fn grade_short_text(question: &Question, answer: &Answer) -> Option<bool> {
    let (reference, pattern) = match &question.settings.config {
        QuestionConfig::ShortText {
            reference_answer,
            pattern,
        } => (reference_answer.as_deref(), pattern.as_deref()),
        // Settings drifted from the declared type; fall back to manual review.
        _ => (None, None),
    };

    let given = answer.answer_text.as_deref().unwrap_or("").trim();

    if let Some(p) = pattern {
        return match regex::RegexBuilder::new(p).case_insensitive(true).build() {
            Ok(re) => Some(
                re.find(given)
                    .map(|m| m.start() == 0 && m.end() == given.len())
                    .unwrap_or(false),
            ),
            Err(e) => {
                tracing::warn!("Unusable short_text pattern on question {}: {}", question.id, e);
                answer.is_correct
            }
        };
    }

    if let Some(reference) = reference {
        return Some(!given.is_empty() && given.eq_ignore_ascii_case(reference.trim()));
    }

    // No automatic rule configured: reviewer decides.
    answer.is_correct
}
