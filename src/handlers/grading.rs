// src/handlers/grading.rs

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::PgPool;

use crate::{
    config::DEFAULT_PASSING_SCORE,
    error::AppError,
    events::{self, DomainEvent},
    handlers::attempt::{ANSWER_COLUMNS, fetch_attempt, load_scoring_inputs, persist_scoring},
    models::{
        attempt::{Answer, AttemptStatus},
        result::GradeAnswerRequest,
    },
    scoring::score_attempt,
    state::AppState,
};

/// Sets a reviewer grade on one answer of a completed attempt.
///
/// Meant for the manually-graded question types (assignments, recordings,
/// short text without a reference answer). The attempt's result is not
/// touched here; a regrade call folds the new grades in.
/// Admin only.
pub async fn grade_answer(
    State(pool): State<PgPool>,
    Path(answer_id): Path<i64>,
    Json(payload): Json<GradeAnswerRequest>,
) -> Result<impl IntoResponse, AppError> {
    let answer = sqlx::query_as::<_, Answer>(&format!(
        "SELECT {ANSWER_COLUMNS} FROM quiz_answers WHERE id = $1"
    ))
    .bind(answer_id)
    .fetch_optional(&pool)
    .await?
    .ok_or_else(|| AppError::NotFound("Answer not found".to_string()))?;

    let attempt = fetch_attempt(&pool, answer.attempt_id).await?;
    if attempt.status != AttemptStatus::Completed {
        return Err(AppError::InvalidState(
            "Only answers of completed attempts can be graded".to_string(),
        ));
    }

    let question = crate::handlers::question::fetch_question(&pool, answer.question_id).await?;

    if payload.points_earned < 0.0 {
        return Err(AppError::Validation(
            "points_earned must not be negative".to_string(),
        ));
    }
    if question.points > 0.0 && payload.points_earned > question.points {
        return Err(AppError::Validation(format!(
            "points_earned exceeds the question's worth of {}",
            question.points
        )));
    }

    let graded = sqlx::query_as::<_, Answer>(&format!(
        r#"
        UPDATE quiz_answers
        SET is_correct = $1, points_earned = $2, reviewer_feedback = $3
        WHERE id = $4
        RETURNING {ANSWER_COLUMNS}
        "#
    ))
    .bind(payload.is_correct)
    .bind(payload.points_earned)
    .bind(&payload.feedback)
    .bind(answer_id)
    .fetch_one(&pool)
    .await?;

    Ok(Json(graded))
}

/// Re-runs the scoring engine over a completed attempt, folding reviewer
/// grades into a rewritten result. This is the only path that modifies a
/// result after its creation.
/// Admin only.
pub async fn regrade_attempt(
    State(state): State<AppState>,
    Path(attempt_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let attempt = fetch_attempt(&state.pool, attempt_id).await?;
    if attempt.status != AttemptStatus::Completed {
        return Err(AppError::InvalidState(
            "Only completed attempts can be regraded".to_string(),
        ));
    }

    let inputs = load_scoring_inputs(&state.pool, &attempt).await?;
    let passing_score = inputs
        .quiz
        .as_ref()
        .map(|q| q.passing_score)
        .unwrap_or(DEFAULT_PASSING_SCORE);

    let summary = score_attempt(
        passing_score,
        &inputs.questions,
        &inputs.options,
        &inputs.answers,
    );

    let result = persist_scoring(&state.pool, &attempt, &summary, None).await?;

    events::publish(
        &state.events,
        DomainEvent::AttemptRegraded {
            attempt_id: attempt.id,
        },
    );

    Ok((StatusCode::OK, Json(result)))
}
