// src/handlers/attempt.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use sqlx::PgPool;

use crate::{
    config::DEFAULT_PASSING_SCORE,
    error::AppError,
    events::{self, DomainEvent},
    handlers::quiz::{fetch_quiz_questions, QUIZ_COLUMNS},
    models::{
        attempt::{AnswerPayload, Attempt, AttemptStatus, Answer, SubmitAnswerRequest},
        question::{QuestionConfig, QuestionOption, QuestionType},
        quiz::{Quiz, QuizStatus},
        result::{AnswerReview, QuizResult, ResultResponse, ResultSummary},
    },
    scoring::{ScoreSummary, score_attempt},
    state::AppState,
    utils::{html::clean_html, jwt::Claims},
};

pub(crate) const ATTEMPT_COLUMNS: &str =
    "id, quiz_id, user_id, attempt_number, status, started_at, completed_at, \
     last_activity_at, time_spent_seconds, overtime, score, max_score, percentage";

pub(crate) const ANSWER_COLUMNS: &str =
    "id, attempt_id, question_id, selected_option_ids, answer_text, file_url, \
     is_correct, points_earned, reviewer_feedback, submitted_at";

pub(crate) const RESULT_COLUMNS: &str =
    "id, attempt_id, quiz_id, total_questions, correct_count, incorrect_count, \
     skipped_count, requires_review, score, max_score, percentage, passed, \
     feedback, created_at";

pub(crate) async fn fetch_attempt(pool: &PgPool, id: i64) -> Result<Attempt, AppError> {
    sqlx::query_as::<_, Attempt>(&format!(
        "SELECT {ATTEMPT_COLUMNS} FROM quiz_attempts WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound("Attempt not found".to_string()))
}

pub(crate) async fn fetch_answers(pool: &PgPool, attempt_id: i64) -> Result<Vec<Answer>, AppError> {
    Ok(sqlx::query_as::<_, Answer>(&format!(
        "SELECT {ANSWER_COLUMNS} FROM quiz_answers WHERE attempt_id = $1 ORDER BY question_id"
    ))
    .bind(attempt_id)
    .fetch_all(pool)
    .await?)
}

/// Existence of other users' attempts is not leaked; a foreign attempt id
/// reads the same as a missing one.
fn require_owner(attempt: &Attempt, claims: &Claims) -> Result<(), AppError> {
    if attempt.user_id != claims.user_id()? {
        return Err(AppError::NotFound("Attempt not found".to_string()));
    }
    Ok(())
}

#[derive(Debug, sqlx::FromRow)]
struct AttemptCounts {
    total: i64,
    terminal: i64,
    open: i64,
}

/// Starts a new attempt for the caller against a published quiz.
///
/// The attempt budget counts every prior attempt that reached a terminal
/// state; abandoned attempts consume it too, so walking away does not grant
/// extra tries. The (quiz, user, attempt_number) unique constraint serializes
/// concurrent starts; the read-count-insert cycle is retried once on
/// conflict before giving up.
pub async fn start_attempt(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(quiz_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    let quiz = crate::handlers::quiz::fetch_quiz(&state.pool, quiz_id).await?;
    if quiz.status != QuizStatus::Active {
        return Err(AppError::NotFound("Quiz not found".to_string()));
    }

    for retry in 0..2 {
        let counts = sqlx::query_as::<_, AttemptCounts>(
            r#"
            SELECT COUNT(*) AS total,
                   COUNT(*) FILTER (WHERE status <> 'in_progress') AS terminal,
                   COUNT(*) FILTER (WHERE status = 'in_progress') AS open
            FROM quiz_attempts
            WHERE quiz_id = $1 AND user_id = $2
            "#,
        )
        .bind(quiz_id)
        .bind(user_id)
        .fetch_one(&state.pool)
        .await?;

        if counts.open > 0 {
            return Err(AppError::InvalidState(
                "An attempt is already in progress for this quiz".to_string(),
            ));
        }

        if counts.terminal >= i64::from(quiz.max_attempts) {
            return Err(AppError::AttemptLimitExceeded(format!(
                "All {} attempts for this quiz have been used",
                quiz.max_attempts
            )));
        }

        let inserted = sqlx::query_as::<_, Attempt>(&format!(
            r#"
            INSERT INTO quiz_attempts (quiz_id, user_id, attempt_number)
            VALUES ($1, $2, $3)
            RETURNING {ATTEMPT_COLUMNS}
            "#
        ))
        .bind(quiz_id)
        .bind(user_id)
        .bind((counts.total + 1) as i32)
        .fetch_one(&state.pool)
        .await;

        match inserted {
            Ok(attempt) => {
                events::publish(
                    &state.events,
                    DomainEvent::AttemptStarted {
                        attempt_id: attempt.id,
                        quiz_id,
                        user_id,
                    },
                );
                return Ok((StatusCode::CREATED, Json(attempt)));
            }
            Err(e) => {
                let is_race = e
                    .as_database_error()
                    .map(|db| db.is_unique_violation())
                    .unwrap_or(false);
                if !is_race {
                    tracing::error!("Failed to start attempt: {:?}", e);
                    return Err(AppError::InternalServerError(e.to_string()));
                }
                if retry == 0 {
                    tracing::warn!(
                        "Concurrent attempt start for user {} quiz {}, retrying",
                        user_id,
                        quiz_id
                    );
                }
            }
        }
    }

    // Lost the race on both passes; the slot went to a concurrent start.
    Err(AppError::AttemptLimitExceeded(
        "Attempt could not be allocated".to_string(),
    ))
}

/// Lists the caller's own attempts against a quiz, oldest first.
pub async fn list_own_attempts(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(quiz_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let attempts = sqlx::query_as::<_, Attempt>(&format!(
        "SELECT {ATTEMPT_COLUMNS} FROM quiz_attempts \
         WHERE quiz_id = $1 AND user_id = $2 ORDER BY attempt_number"
    ))
    .bind(quiz_id)
    .bind(claims.user_id()?)
    .fetch_all(&pool)
    .await?;

    Ok(Json(attempts))
}

/// Submits one answer into an in-progress attempt.
///
/// Upserts on (attempt, question): double-clicks and client retries are
/// idempotent, a changed payload replaces the previous answer.
pub async fn submit_answer(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(attempt_id): Path<i64>,
    Json(req): Json<SubmitAnswerRequest>,
) -> Result<impl IntoResponse, AppError> {
    let attempt = fetch_attempt(&pool, attempt_id).await?;
    require_owner(&attempt, &claims)?;

    if attempt.status != AttemptStatus::InProgress {
        return Err(AppError::InvalidState(format!(
            "Attempt is {}, answers can no longer be submitted",
            attempt.status.as_str()
        )));
    }

    // Quiz deletion is blocked while attempts are in progress, so an open
    // attempt always has its quiz.
    let quiz_id = attempt
        .quiz_id
        .ok_or_else(|| AppError::InvalidState("Quiz no longer exists".to_string()))?;

    let question = crate::handlers::question::fetch_question(&pool, req.question_id).await?;
    if question.quiz_id != quiz_id {
        return Err(AppError::NotFound(
            "Question is not part of this quiz".to_string(),
        ));
    }

    if !req.answer.matches(question.question_type) {
        return Err(AppError::Validation(format!(
            "Answer kind does not match question type '{}'",
            question.question_type.as_str()
        )));
    }

    if let Some(ids) = req.answer.option_ids() {
        validate_selected_options(&pool, &question.settings.config, question.question_type, question.id, ids)
            .await?;
    }

    let (selected, text, file_url) = match &req.answer {
        AnswerPayload::Choice {
            selected_option_ids,
        } => (Some(sqlx::types::Json(selected_option_ids.clone())), None, None),
        AnswerPayload::Ordering { ordered_option_ids } => {
            (Some(sqlx::types::Json(ordered_option_ids.clone())), None, None)
        }
        AnswerPayload::Text { text } => {
            // Essays arrive as rich text and get sanitized; short answers are
            // compared literally and must be stored as-is.
            let stored = if question.question_type == QuestionType::TextAssignment {
                clean_html(text)
            } else {
                text.clone()
            };
            (None, Some(stored), None)
        }
        AnswerPayload::File { file_url } => (None, None, Some(file_url.clone())),
    };

    // One transaction: the stored answer and the activity stamp the expiry
    // sweep reads must never drift apart.
    let mut tx = pool.begin().await?;

    let answer = sqlx::query_as::<_, Answer>(&format!(
        r#"
        INSERT INTO quiz_answers (attempt_id, question_id, selected_option_ids, answer_text, file_url)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (attempt_id, question_id) DO UPDATE SET
            selected_option_ids = EXCLUDED.selected_option_ids,
            answer_text = EXCLUDED.answer_text,
            file_url = EXCLUDED.file_url,
            is_correct = NULL,
            points_earned = 0,
            reviewer_feedback = NULL,
            submitted_at = now()
        RETURNING {ANSWER_COLUMNS}
        "#
    ))
    .bind(attempt_id)
    .bind(req.question_id)
    .bind(selected)
    .bind(text)
    .bind(file_url)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| {
        tracing::error!("Failed to upsert answer: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    sqlx::query("UPDATE quiz_attempts SET last_activity_at = now() WHERE id = $1")
        .bind(attempt_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    Ok(Json(answer))
}

/// Rejects selections that do not belong to the question, duplicates, and
/// multiple picks on single-answer questions.
async fn validate_selected_options(
    pool: &PgPool,
    config: &QuestionConfig,
    question_type: QuestionType,
    question_id: i64,
    selected: &[i64],
) -> Result<(), AppError> {
    let valid_ids: Vec<i64> =
        sqlx::query_scalar("SELECT id FROM quiz_question_options WHERE question_id = $1")
            .bind(question_id)
            .fetch_all(pool)
            .await?;

    let mut seen = std::collections::HashSet::new();
    for id in selected {
        if !valid_ids.contains(id) {
            return Err(AppError::Validation(format!(
                "Option {id} does not belong to this question"
            )));
        }
        if !seen.insert(*id) {
            return Err(AppError::Validation(format!("Option {id} selected twice")));
        }
    }

    let multi_select = matches!(config, QuestionConfig::MultipleChoice { multi_select: true });
    if question_type.is_choice() && !multi_select && selected.len() > 1 {
        return Err(AppError::Validation(
            "This question accepts a single selection".to_string(),
        ));
    }

    Ok(())
}

pub(crate) struct ScoringInputs {
    pub quiz: Option<Quiz>,
    pub questions: Vec<crate::models::question::Question>,
    pub options: Vec<QuestionOption>,
    pub answers: Vec<Answer>,
}

pub(crate) async fn load_scoring_inputs(
    pool: &PgPool,
    attempt: &Attempt,
) -> Result<ScoringInputs, AppError> {
    let (quiz, questions, options) = match attempt.quiz_id {
        Some(quiz_id) => {
            let quiz = sqlx::query_as::<_, Quiz>(&format!(
                "SELECT {QUIZ_COLUMNS} FROM quizzes WHERE id = $1"
            ))
            .bind(quiz_id)
            .fetch_optional(pool)
            .await?;
            let (questions, options) = fetch_quiz_questions(pool, quiz_id).await?;
            (quiz, questions, options)
        }
        // Quiz deleted since: score over nothing, every answer is orphaned.
        None => (None, Vec::new(), Vec::new()),
    };

    let answers = fetch_answers(pool, attempt.id).await?;

    Ok(ScoringInputs {
        quiz,
        questions,
        options,
        answers,
    })
}

/// Writes the attempt's final state and its result row in one transaction.
pub(crate) async fn persist_scoring(
    pool: &PgPool,
    attempt: &Attempt,
    summary: &ScoreSummary,
    completion: Option<(chrono::DateTime<chrono::Utc>, i64, bool)>,
) -> Result<QuizResult, AppError> {
    let mut tx = pool.begin().await?;

    if let Some((completed_at, time_spent, overtime)) = completion {
        let updated = sqlx::query(
            r#"
            UPDATE quiz_attempts
            SET status = 'completed', completed_at = $1, last_activity_at = $1,
                time_spent_seconds = $2, overtime = $3,
                score = $4, max_score = $5, percentage = $6
            WHERE id = $7 AND status = 'in_progress'
            "#,
        )
        .bind(completed_at)
        .bind(time_spent)
        .bind(overtime)
        .bind(summary.score)
        .bind(summary.max_score)
        .bind(summary.percentage)
        .bind(attempt.id)
        .execute(&mut *tx)
        .await?;

        // A concurrent complete beat us; the first writer wins.
        if updated.rows_affected() == 0 {
            return Err(AppError::InvalidState(
                "Attempt was already completed".to_string(),
            ));
        }
    } else {
        sqlx::query(
            "UPDATE quiz_attempts SET score = $1, max_score = $2, percentage = $3 WHERE id = $4",
        )
        .bind(summary.score)
        .bind(summary.max_score)
        .bind(summary.percentage)
        .bind(attempt.id)
        .execute(&mut *tx)
        .await?;
    }

    for graded in &summary.graded {
        sqlx::query(
            "UPDATE quiz_answers SET is_correct = $1, points_earned = $2 \
             WHERE attempt_id = $3 AND question_id = $4",
        )
        .bind(graded.is_correct)
        .bind(graded.points_earned)
        .bind(attempt.id)
        .bind(graded.question_id)
        .execute(&mut *tx)
        .await?;
    }

    let result = sqlx::query_as::<_, QuizResult>(&format!(
        r#"
        INSERT INTO quiz_results
        (attempt_id, quiz_id, total_questions, correct_count, incorrect_count,
         skipped_count, requires_review, score, max_score, percentage, passed)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        ON CONFLICT (attempt_id) DO UPDATE SET
            total_questions = EXCLUDED.total_questions,
            correct_count = EXCLUDED.correct_count,
            incorrect_count = EXCLUDED.incorrect_count,
            skipped_count = EXCLUDED.skipped_count,
            requires_review = EXCLUDED.requires_review,
            score = EXCLUDED.score,
            max_score = EXCLUDED.max_score,
            percentage = EXCLUDED.percentage,
            passed = EXCLUDED.passed
        RETURNING {RESULT_COLUMNS}
        "#
    ))
    .bind(attempt.id)
    .bind(attempt.quiz_id)
    .bind(summary.total_questions)
    .bind(summary.correct_count)
    .bind(summary.incorrect_count)
    .bind(summary.skipped_count)
    .bind(summary.requires_review)
    .bind(summary.score)
    .bind(summary.max_score)
    .bind(summary.percentage)
    .bind(summary.passed)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok(result)
}

/// Completes an in-progress attempt: stamps timing, scores every answer and
/// writes the denormalized result, all transactionally.
///
/// Late completions are accepted and flagged as overtime; time spent is
/// clamped to the quiz's limit.
pub async fn complete_attempt(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(attempt_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let attempt = fetch_attempt(&state.pool, attempt_id).await?;
    require_owner(&attempt, &claims)?;

    if attempt.status != AttemptStatus::InProgress {
        return Err(AppError::InvalidState(format!(
            "Attempt is already {}",
            attempt.status.as_str()
        )));
    }

    let inputs = load_scoring_inputs(&state.pool, &attempt).await?;
    let passing_score = inputs
        .quiz
        .as_ref()
        .map(|q| q.passing_score)
        .unwrap_or(DEFAULT_PASSING_SCORE);

    let summary = score_attempt(passing_score, &inputs.questions, &inputs.options, &inputs.answers);

    let completed_at = Utc::now();
    let elapsed = (completed_at - attempt.started_at).num_seconds().max(0);
    let (time_spent, overtime) = match inputs.quiz.as_ref().and_then(|q| q.time_limit_minutes) {
        Some(limit_minutes) => {
            let limit = i64::from(limit_minutes) * 60;
            (elapsed.min(limit), elapsed > limit)
        }
        None => (elapsed, false),
    };

    let result = persist_scoring(
        &state.pool,
        &attempt,
        &summary,
        Some((completed_at, time_spent, overtime)),
    )
    .await?;

    events::publish(
        &state.events,
        DomainEvent::AttemptCompleted {
            attempt_id: attempt.id,
            quiz_id: attempt.quiz_id.unwrap_or_default(),
            user_id: attempt.user_id,
            passed: result.passed,
        },
    );

    Ok(Json(result))
}

/// Reads the result of a completed attempt.
///
/// Learners are subject to the quiz's display flags: `show_results = false`
/// hides the breakdown entirely, `show_correct_answers = false` strips
/// correctness data (correct options, reference answers) from the review.
/// Admin callers always get the full picture.
pub async fn get_result(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(attempt_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let attempt = fetch_attempt(&pool, attempt_id).await?;
    if !claims.is_admin() {
        require_owner(&attempt, &claims)?;
    }

    if attempt.status != AttemptStatus::Completed {
        return Err(AppError::InvalidState(
            "Attempt has no result yet".to_string(),
        ));
    }

    let result = sqlx::query_as::<_, QuizResult>(&format!(
        "SELECT {RESULT_COLUMNS} FROM quiz_results WHERE attempt_id = $1"
    ))
    .bind(attempt_id)
    .fetch_optional(&pool)
    .await?
    .ok_or_else(|| AppError::NotFound("Result not found".to_string()))?;

    let inputs = load_scoring_inputs(&pool, &attempt).await?;

    // Flag defaults for results that outlived their quiz.
    let (show_results, show_correct) = inputs
        .quiz
        .as_ref()
        .map(|q| (q.show_results, q.show_correct_answers))
        .unwrap_or((true, false));

    let visible = claims.is_admin() || show_results;
    let reveal = claims.is_admin() || show_correct;

    let review = if visible {
        Some(build_review(&inputs, reveal))
    } else {
        None
    };

    Ok(Json(ResultResponse {
        attempt_id: attempt.id,
        attempt_number: attempt.attempt_number,
        status: attempt.status,
        completed_at: attempt.completed_at,
        time_spent_seconds: attempt.time_spent_seconds,
        overtime: attempt.overtime,
        results_visible: visible,
        result: visible.then(|| ResultSummary::from(result)),
        review,
    }))
}

fn build_review(inputs: &ScoringInputs, reveal: bool) -> Vec<AnswerReview> {
    let answers: std::collections::HashMap<i64, &Answer> =
        inputs.answers.iter().map(|a| (a.question_id, a)).collect();

    inputs
        .questions
        .iter()
        .map(|question| {
            let answer = answers.get(&question.id);

            let correct_option_ids = if reveal {
                match question.question_type {
                    QuestionType::MultipleChoice | QuestionType::TrueFalse => Some(
                        inputs
                            .options
                            .iter()
                            .filter(|o| o.question_id == question.id && o.is_correct)
                            .map(|o| o.id)
                            .collect(),
                    ),
                    QuestionType::MatchOrdering => {
                        let mut ordered: Vec<&QuestionOption> = inputs
                            .options
                            .iter()
                            .filter(|o| o.question_id == question.id)
                            .collect();
                        ordered.sort_by_key(|o| o.position);
                        Some(ordered.into_iter().map(|o| o.id).collect())
                    }
                    _ => None,
                }
            } else {
                None
            };

            let reference_answer = if reveal {
                match &question.settings.config {
                    QuestionConfig::ShortText {
                        reference_answer, ..
                    } => reference_answer.clone(),
                    _ => None,
                }
            } else {
                None
            };

            AnswerReview {
                question_id: question.id,
                answer_id: answer.map(|a| a.id),
                prompt: question.prompt.clone(),
                question_type: question.question_type,
                points_possible: question.points,
                selected_option_ids: answer
                    .and_then(|a| a.selected_option_ids.as_ref().map(|ids| ids.0.clone())),
                answer_text: answer.and_then(|a| a.answer_text.clone()),
                file_url: answer.and_then(|a| a.file_url.clone()),
                is_correct: answer.and_then(|a| a.is_correct),
                points_earned: answer.map(|a| a.points_earned).unwrap_or(0.0),
                reviewer_feedback: answer.and_then(|a| a.reviewer_feedback.clone()),
                correct_option_ids,
                reference_answer,
            }
        })
        .collect()
}
