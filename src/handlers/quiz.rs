// src/handlers/quiz.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Serialize;
use sqlx::{PgPool, Postgres, QueryBuilder};
use validator::Validate;

use crate::{
    error::AppError,
    events::{self, DomainEvent},
    models::{
        question::{PublicOption, PublicQuestion, Question, QuestionOption},
        quiz::{CreateQuizRequest, Quiz, QuizStatus, UpdateQuizRequest},
    },
    state::AppState,
    utils::{html::clean_html, jwt::Claims},
};

pub(crate) const QUIZ_COLUMNS: &str = "id, lesson_id, course_id, title, description, instructions, \
     time_limit_minutes, passing_score, max_attempts, shuffle_questions, \
     show_correct_answers, show_results, status, created_at, updated_at";

pub(crate) async fn fetch_quiz(pool: &PgPool, id: i64) -> Result<Quiz, AppError> {
    sqlx::query_as::<_, Quiz>(&format!(
        "SELECT {QUIZ_COLUMNS} FROM quizzes WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound("Quiz not found".to_string()))
}

pub(crate) async fn fetch_quiz_questions(
    pool: &PgPool,
    quiz_id: i64,
) -> Result<(Vec<Question>, Vec<QuestionOption>), AppError> {
    let questions = sqlx::query_as::<_, Question>(
        r#"
        SELECT id, quiz_id, prompt, question_type, position, points, required,
               media_url, settings, created_at, updated_at
        FROM quiz_questions
        WHERE quiz_id = $1
        ORDER BY position
        "#,
    )
    .bind(quiz_id)
    .fetch_all(pool)
    .await?;

    let options = sqlx::query_as::<_, QuestionOption>(
        r#"
        SELECT id, question_id, content, media_url, is_correct, position
        FROM quiz_question_options
        WHERE question_id IN (SELECT id FROM quiz_questions WHERE quiz_id = $1)
        ORDER BY question_id, position
        "#,
    )
    .bind(quiz_id)
    .fetch_all(pool)
    .await?;

    Ok((questions, options))
}

/// Lists the quizzes attached to a lesson.
///
/// Authors see everything; learners only see published quizzes.
pub async fn list_lesson_quizzes(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(lesson_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let sql = if claims.is_admin() {
        format!("SELECT {QUIZ_COLUMNS} FROM quizzes WHERE lesson_id = $1 ORDER BY id")
    } else {
        format!(
            "SELECT {QUIZ_COLUMNS} FROM quizzes WHERE lesson_id = $1 AND status = 'active' ORDER BY id"
        )
    };

    let quizzes = sqlx::query_as::<_, Quiz>(&sql)
        .bind(lesson_id)
        .fetch_all(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to list quizzes for lesson {}: {:?}", lesson_id, e);
            AppError::InternalServerError(e.to_string())
        })?;

    Ok(Json(quizzes))
}

/// Authoring view of one question: full row plus options with correctness.
#[derive(Debug, Serialize)]
pub struct AuthorQuestion {
    #[serde(flatten)]
    pub question: Question,
    pub options: Vec<QuestionOption>,
}

#[derive(Debug, Serialize)]
pub struct AuthorQuizDetail {
    #[serde(flatten)]
    pub quiz: Quiz,
    pub questions: Vec<AuthorQuestion>,
}

#[derive(Debug, Serialize)]
pub struct PublicQuizDetail {
    #[serde(flatten)]
    pub quiz: Quiz,
    pub questions: Vec<PublicQuestion>,
}

/// Fetches one quiz with its questions.
///
/// Learners get the redacted view: no correctness flags, no settings (which
/// may carry reference answers), and only for published quizzes. Question
/// shuffling is left to the UI based on `shuffle_questions`.
pub async fn get_quiz(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<axum::response::Response, AppError> {
    let quiz = fetch_quiz(&pool, id).await?;

    if !claims.is_admin() && quiz.status != QuizStatus::Active {
        return Err(AppError::NotFound("Quiz not found".to_string()));
    }

    let (questions, options) = fetch_quiz_questions(&pool, id).await?;

    let mut options_by_question: std::collections::HashMap<i64, Vec<QuestionOption>> =
        std::collections::HashMap::new();
    for opt in options {
        options_by_question
            .entry(opt.question_id)
            .or_default()
            .push(opt);
    }

    if claims.is_admin() {
        let questions = questions
            .into_iter()
            .map(|q| AuthorQuestion {
                options: options_by_question.remove(&q.id).unwrap_or_default(),
                question: q,
            })
            .collect();
        return Ok(Json(AuthorQuizDetail { quiz, questions }).into_response());
    }

    let questions = questions
        .into_iter()
        .map(|q| PublicQuestion {
            id: q.id,
            question_type: q.question_type,
            prompt: q.prompt,
            position: q.position,
            points: q.points,
            required: q.required,
            media_url: q.media_url,
            options: options_by_question
                .remove(&q.id)
                .unwrap_or_default()
                .into_iter()
                .map(PublicOption::from)
                .collect(),
        })
        .collect();

    Ok(Json(PublicQuizDetail { quiz, questions }).into_response())
}

/// Creates a new quiz in draft status.
/// Admin only.
pub async fn create_quiz(
    State(state): State<AppState>,
    Json(payload): Json<CreateQuizRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let description = payload.description.as_deref().map(clean_html);
    let instructions = payload.instructions.as_deref().map(clean_html);

    let quiz = sqlx::query_as::<_, Quiz>(&format!(
        r#"
        INSERT INTO quizzes
        (lesson_id, course_id, title, description, instructions, time_limit_minutes,
         passing_score, max_attempts, shuffle_questions, show_correct_answers, show_results)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        RETURNING {QUIZ_COLUMNS}
        "#
    ))
    .bind(payload.lesson_id)
    .bind(payload.course_id)
    .bind(&payload.title)
    .bind(description)
    .bind(instructions)
    .bind(payload.time_limit_minutes)
    .bind(payload.passing_score)
    .bind(payload.max_attempts)
    .bind(payload.shuffle_questions)
    .bind(payload.show_correct_answers)
    .bind(payload.show_results)
    .fetch_one(&state.pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create quiz: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    events::publish(
        &state.events,
        DomainEvent::QuizChanged {
            quiz_id: quiz.id,
            lesson_id: quiz.lesson_id,
        },
    );

    Ok((StatusCode::CREATED, Json(quiz)))
}

/// Updates quiz metadata and settings. Fields absent from the payload are
/// left untouched.
/// Admin only.
pub async fn update_quiz(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateQuizRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let quiz = fetch_quiz(&state.pool, id).await?;

    if payload.is_empty() {
        return Ok(StatusCode::OK);
    }

    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE quizzes SET ");
    let mut separated = builder.separated(", ");

    if let Some(title) = payload.title {
        separated.push("title = ");
        separated.push_bind_unseparated(title);
    }

    if let Some(description) = payload.description {
        separated.push("description = ");
        separated.push_bind_unseparated(clean_html(&description));
    }

    if let Some(instructions) = payload.instructions {
        separated.push("instructions = ");
        separated.push_bind_unseparated(clean_html(&instructions));
    }

    if let Some(time_limit) = payload.time_limit_minutes {
        separated.push("time_limit_minutes = ");
        separated.push_bind_unseparated(time_limit);
    }

    if let Some(passing_score) = payload.passing_score {
        separated.push("passing_score = ");
        separated.push_bind_unseparated(passing_score);
    }

    if let Some(max_attempts) = payload.max_attempts {
        separated.push("max_attempts = ");
        separated.push_bind_unseparated(max_attempts);
    }

    if let Some(shuffle) = payload.shuffle_questions {
        separated.push("shuffle_questions = ");
        separated.push_bind_unseparated(shuffle);
    }

    if let Some(show_correct) = payload.show_correct_answers {
        separated.push("show_correct_answers = ");
        separated.push_bind_unseparated(show_correct);
    }

    if let Some(show_results) = payload.show_results {
        separated.push("show_results = ");
        separated.push_bind_unseparated(show_results);
    }

    separated.push("updated_at = now()");

    builder.push(" WHERE id = ");
    builder.push_bind(id);

    builder.build().execute(&state.pool).await.map_err(|e| {
        tracing::error!("Failed to update quiz {}: {:?}", id, e);
        AppError::InternalServerError(e.to_string())
    })?;

    events::publish(
        &state.events,
        DomainEvent::QuizChanged {
            quiz_id: id,
            lesson_id: quiz.lesson_id,
        },
    );

    Ok(StatusCode::OK)
}

async fn set_quiz_status(state: &AppState, id: i64, status: QuizStatus) -> Result<(), AppError> {
    let quiz = fetch_quiz(&state.pool, id).await?;

    if status == QuizStatus::Active {
        let question_count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM quiz_questions WHERE quiz_id = $1")
                .bind(id)
                .fetch_one(&state.pool)
                .await?;
        if question_count == 0 {
            return Err(AppError::Validation(
                "Cannot publish a quiz without questions".to_string(),
            ));
        }
    }

    sqlx::query("UPDATE quizzes SET status = $1, updated_at = now() WHERE id = $2")
        .bind(status.as_str())
        .bind(id)
        .execute(&state.pool)
        .await?;

    events::publish(
        &state.events,
        DomainEvent::QuizChanged {
            quiz_id: id,
            lesson_id: quiz.lesson_id,
        },
    );

    Ok(())
}

/// Publishes a quiz (draft -> active).
/// Admin only.
pub async fn publish_quiz(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    set_quiz_status(&state, id, QuizStatus::Active).await?;
    Ok(StatusCode::OK)
}

/// Unpublishes a quiz (active -> draft). Running attempts are unaffected.
/// Admin only.
pub async fn unpublish_quiz(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    set_quiz_status(&state, id, QuizStatus::Draft).await?;
    Ok(StatusCode::OK)
}

/// Deletes a quiz and (via cascade) its questions and options.
///
/// Blocked while any attempt is still in progress. Completed attempts and
/// their results survive with a dangling quiz reference; that is accepted
/// for historical integrity.
/// Admin only.
pub async fn delete_quiz(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let quiz = fetch_quiz(&state.pool, id).await?;

    let open_attempts: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM quiz_attempts WHERE quiz_id = $1 AND status = 'in_progress'",
    )
    .bind(id)
    .fetch_one(&state.pool)
    .await?;

    if open_attempts > 0 {
        return Err(AppError::Conflict(format!(
            "Quiz has {open_attempts} attempt(s) in progress"
        )));
    }

    let result = sqlx::query("DELETE FROM quizzes WHERE id = $1")
        .bind(id)
        .execute(&state.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to delete quiz {}: {:?}", id, e);
            AppError::InternalServerError(e.to_string())
        })?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Quiz not found".to_string()));
    }

    events::publish(
        &state.events,
        DomainEvent::QuizDeleted {
            quiz_id: id,
            lesson_id: quiz.lesson_id,
        },
    );

    Ok(StatusCode::NO_CONTENT)
}
