// src/handlers/question.rs

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::{PgPool, Postgres, Transaction};

use crate::{
    error::AppError,
    events::{self, DomainEvent},
    models::question::{
        CreateQuestionRequest, NewOption, Question, UpdateQuestionRequest,
        validate_question_fields,
    },
    state::AppState,
    utils::html::clean_html,
};

const QUESTION_COLUMNS: &str = "id, quiz_id, prompt, question_type, position, points, required, \
     media_url, settings, created_at, updated_at";

fn map_write_error(e: sqlx::Error) -> AppError {
    if let Some(db) = e.as_database_error() {
        if db.is_unique_violation() {
            return AppError::Conflict(
                "Another question already uses this position in the quiz".to_string(),
            );
        }
    }
    tracing::error!("Question write failed: {:?}", e);
    AppError::InternalServerError(e.to_string())
}

async fn insert_options(
    tx: &mut Transaction<'_, Postgres>,
    question_id: i64,
    options: &[NewOption],
) -> Result<(), AppError> {
    for opt in options {
        sqlx::query(
            r#"
            INSERT INTO quiz_question_options (question_id, content, media_url, is_correct, position)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(question_id)
        .bind(&opt.content)
        .bind(&opt.media_url)
        .bind(opt.is_correct)
        .bind(opt.position)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

pub(crate) async fn fetch_question(pool: &PgPool, id: i64) -> Result<Question, AppError> {
    sqlx::query_as::<_, Question>(&format!(
        "SELECT {QUESTION_COLUMNS} FROM quiz_questions WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound("Question not found".to_string()))
}

/// Creates a question (with its options for choice types) inside a quiz.
/// Admin only.
pub async fn create_question(
    State(state): State<AppState>,
    Json(payload): Json<CreateQuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    validate_question_fields(&payload.prompt, payload.points).map_err(AppError::Validation)?;
    payload.body.validate().map_err(AppError::Validation)?;

    // The quiz must exist; a clean 404 beats a foreign key error.
    crate::handlers::quiz::fetch_quiz(&state.pool, payload.quiz_id).await?;

    let mut tx = state.pool.begin().await?;

    let question = sqlx::query_as::<_, Question>(&format!(
        r#"
        INSERT INTO quiz_questions
        (quiz_id, prompt, question_type, position, points, required, media_url, settings)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING {QUESTION_COLUMNS}
        "#
    ))
    .bind(payload.quiz_id)
    .bind(clean_html(&payload.prompt))
    .bind(payload.body.question_type().as_str())
    .bind(payload.position)
    .bind(payload.points)
    .bind(payload.required)
    .bind(&payload.media_url)
    .bind(sqlx::types::Json(payload.body.settings()))
    .fetch_one(&mut *tx)
    .await
    .map_err(map_write_error)?;

    insert_options(&mut tx, question.id, payload.body.options()).await?;

    tx.commit().await?;

    events::publish(
        &state.events,
        DomainEvent::QuestionChanged {
            quiz_id: question.quiz_id,
            question_id: question.id,
        },
    );

    Ok((StatusCode::CREATED, Json(question)))
}

/// Replaces a question's definition, options included. Answers already given
/// against the old definition are rescored on attempt completion.
/// Admin only.
pub async fn update_question(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateQuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    validate_question_fields(&payload.prompt, payload.points).map_err(AppError::Validation)?;
    payload.body.validate().map_err(AppError::Validation)?;

    let existing = fetch_question(&state.pool, id).await?;

    let mut tx = state.pool.begin().await?;

    let question = sqlx::query_as::<_, Question>(&format!(
        r#"
        UPDATE quiz_questions
        SET prompt = $1, question_type = $2, position = $3, points = $4,
            required = $5, media_url = $6, settings = $7, updated_at = now()
        WHERE id = $8
        RETURNING {QUESTION_COLUMNS}
        "#
    ))
    .bind(clean_html(&payload.prompt))
    .bind(payload.body.question_type().as_str())
    .bind(payload.position)
    .bind(payload.points)
    .bind(payload.required)
    .bind(&payload.media_url)
    .bind(sqlx::types::Json(payload.body.settings()))
    .bind(id)
    .fetch_one(&mut *tx)
    .await
    .map_err(map_write_error)?;

    sqlx::query("DELETE FROM quiz_question_options WHERE question_id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    insert_options(&mut tx, id, payload.body.options()).await?;

    tx.commit().await?;

    events::publish(
        &state.events,
        DomainEvent::QuestionChanged {
            quiz_id: existing.quiz_id,
            question_id: id,
        },
    );

    Ok(Json(question))
}

/// Deletes a question; its options and any answers referencing it go with it
/// (the scoring engine treats the gap as a skipped question).
/// Admin only.
pub async fn delete_question(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let existing = fetch_question(&state.pool, id).await?;

    let result = sqlx::query("DELETE FROM quiz_questions WHERE id = $1")
        .bind(id)
        .execute(&state.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to delete question {}: {:?}", id, e);
            AppError::InternalServerError(e.to_string())
        })?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Question not found".to_string()));
    }

    events::publish(
        &state.events,
        DomainEvent::QuestionChanged {
            quiz_id: existing.quiz_id,
            question_id: id,
        },
    );

    Ok(StatusCode::NO_CONTENT)
}
