// src/routes.rs

use axum::{
    Router,
    http::Method,
    middleware,
    routing::{get, post, put},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{attempt, grading, question, quiz},
    state::AppState,
    utils::jwt::{admin_middleware, auth_middleware},
};

/// Assembles the main application router.
///
/// * Learner routes need a valid bearer token; handlers branch on the role.
/// * Authoring/grading routes additionally require the 'admin' role.
/// * Applies global middleware (Trace, CORS) and injects the shared state.
pub fn create_router(state: AppState) -> Router {
    let origins = [
        "http://localhost:3000".parse().unwrap(),
        "http://127.0.0.1:3000".parse().unwrap(),
    ];

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
        ]);

    let taking_routes = Router::new()
        .route("/lessons/{id}/quizzes", get(quiz::list_lesson_quizzes))
        .route("/quizzes/{id}", get(quiz::get_quiz))
        .route(
            "/quizzes/{id}/attempts",
            post(attempt::start_attempt).get(attempt::list_own_attempts),
        )
        .route("/attempts/{id}/answers", post(attempt::submit_answer))
        .route("/attempts/{id}/complete", post(attempt::complete_attempt))
        .route("/attempts/{id}/result", get(attempt::get_result));

    let authoring_routes = Router::new()
        .route("/quizzes", post(quiz::create_quiz))
        .route(
            "/quizzes/{id}",
            put(quiz::update_quiz).delete(quiz::delete_quiz),
        )
        .route("/quizzes/{id}/publish", post(quiz::publish_quiz))
        .route("/quizzes/{id}/unpublish", post(quiz::unpublish_quiz))
        .route("/quiz-questions", post(question::create_question))
        .route(
            "/quiz-questions/{id}",
            put(question::update_question).delete(question::delete_question),
        )
        .route("/answers/{id}/grade", put(grading::grade_answer))
        .route("/attempts/{id}/regrade", post(grading::regrade_attempt))
        .layer(middleware::from_fn(admin_middleware));

    Router::new()
        .nest("/api", taking_routes.merge(authoring_routes))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
