// tests/common/mod.rs
#![allow(dead_code)]

use sqlx::postgres::PgPoolOptions;
use vizsga_backend::{config::Config, routes, state::AppState, utils::jwt::sign_jwt};

pub const TEST_SECRET: &str = "test_secret_for_integration_tests";

/// Helper function to spawn the app on a random port for testing.
/// Returns the base URL (e.g., "http://127.0.0.1:12345").
pub async fn spawn_app() -> String {
    // Note: For Postgres, you must have a running database.
    // We'll read from DATABASE_URL environment variable.
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&database_url)
        .await
        .expect("Failed to connect to Postgres for testing. Make sure DATABASE_URL is set.");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to migrate database");

    let config = Config {
        database_url: database_url.clone(),
        jwt_secret: TEST_SECRET.to_string(),
        rust_log: "error".to_string(),
    };

    let state = AppState::new(pool, config);
    let app = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");

    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    address
}

/// Direct database handle for tests that set up or inspect rows behind the
/// API's back (e.g. backdating timestamps for the expiry sweep).
pub async fn test_pool() -> sqlx::PgPool {
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    PgPoolOptions::new()
        .max_connections(1)
        .connect(&database_url)
        .await
        .expect("Failed to connect to Postgres for testing")
}

/// Random positive id standing in for users/lessons owned by other services.
pub fn unique_id() -> i64 {
    (uuid::Uuid::new_v4().as_u128() as i64) & 0x7fff_ffff_ffff_ffff
}

pub fn admin_token() -> String {
    sign_jwt(unique_id(), "admin", TEST_SECRET, 600).expect("failed to sign admin token")
}

pub fn learner_token(user_id: i64) -> String {
    sign_jwt(user_id, "user", TEST_SECRET, 600).expect("failed to sign learner token")
}

/// Creates a quiz through the authoring API; panics on anything but 201.
pub async fn create_quiz(
    client: &reqwest::Client,
    address: &str,
    token: &str,
    body: serde_json::Value,
) -> serde_json::Value {
    let response = client
        .post(format!("{}/api/quizzes", address))
        .bearer_auth(token)
        .json(&body)
        .send()
        .await
        .expect("create quiz request failed");
    assert_eq!(response.status().as_u16(), 201, "quiz creation rejected");
    response.json().await.expect("quiz response was not JSON")
}

/// Creates a question through the authoring API; panics on anything but 201.
pub async fn create_question(
    client: &reqwest::Client,
    address: &str,
    token: &str,
    body: serde_json::Value,
) -> serde_json::Value {
    let response = client
        .post(format!("{}/api/quiz-questions", address))
        .bearer_auth(token)
        .json(&body)
        .send()
        .await
        .expect("create question request failed");
    assert_eq!(response.status().as_u16(), 201, "question creation rejected");
    response.json().await.expect("question response was not JSON")
}

pub async fn publish_quiz(client: &reqwest::Client, address: &str, token: &str, quiz_id: i64) {
    let response = client
        .post(format!("{}/api/quizzes/{}/publish", address, quiz_id))
        .bearer_auth(token)
        .send()
        .await
        .expect("publish request failed");
    assert_eq!(response.status().as_u16(), 200, "publish rejected");
}

/// Builds and publishes the canonical two-question quiz:
/// Q1 multiple_choice 1pt (correct: "Budapest"), Q2 true_false 1pt
/// (correct: "Igaz"). Returns (quiz_id, q1_id, q2_id).
pub async fn seed_two_question_quiz(
    client: &reqwest::Client,
    address: &str,
    admin: &str,
    quiz_overrides: serde_json::Value,
) -> (i64, i64, i64) {
    let mut quiz_body = serde_json::json!({
        "lesson_id": unique_id(),
        "title": "Magyarország kvíz",
        "description": "Alapismeretek",
        "passing_score": 70.0,
        "max_attempts": 3
    });
    if let Some(overrides) = quiz_overrides.as_object() {
        for (k, v) in overrides {
            quiz_body[k] = v.clone();
        }
    }

    let quiz = create_quiz(client, address, admin, quiz_body).await;
    let quiz_id = quiz["id"].as_i64().unwrap();

    let q1 = create_question(
        client,
        address,
        admin,
        serde_json::json!({
            "quiz_id": quiz_id,
            "prompt": "Mi Magyarország fővárosa?",
            "position": 1,
            "points": 1.0,
            "type": "multiple_choice",
            "options": [
                {"content": "Szeged", "is_correct": false, "position": 0},
                {"content": "Budapest", "is_correct": true, "position": 1}
            ]
        }),
    )
    .await;

    let q2 = create_question(
        client,
        address,
        admin,
        serde_json::json!({
            "quiz_id": quiz_id,
            "prompt": "A Duna átfolyik Budapesten.",
            "position": 2,
            "points": 1.0,
            "type": "true_false",
            "options": [
                {"content": "Igaz", "is_correct": true, "position": 0},
                {"content": "Hamis", "is_correct": false, "position": 1}
            ]
        }),
    )
    .await;

    publish_quiz(client, address, admin, quiz_id).await;

    (
        quiz_id,
        q1["id"].as_i64().unwrap(),
        q2["id"].as_i64().unwrap(),
    )
}

/// Learner view of the quiz; used to discover option ids by content.
pub async fn fetch_public_quiz(
    client: &reqwest::Client,
    address: &str,
    token: &str,
    quiz_id: i64,
) -> serde_json::Value {
    let response = client
        .get(format!("{}/api/quizzes/{}", address, quiz_id))
        .bearer_auth(token)
        .send()
        .await
        .expect("get quiz request failed");
    assert_eq!(response.status().as_u16(), 200);
    response.json().await.unwrap()
}

/// Finds an option id in a quiz detail payload by question id and content.
pub fn option_id(quiz_detail: &serde_json::Value, question_id: i64, content: &str) -> i64 {
    quiz_detail["questions"]
        .as_array()
        .unwrap()
        .iter()
        .find(|q| q["id"].as_i64() == Some(question_id))
        .and_then(|q| {
            q["options"]
                .as_array()
                .unwrap()
                .iter()
                .find(|o| o["content"].as_str() == Some(content))
        })
        .and_then(|o| o["id"].as_i64())
        .unwrap_or_else(|| panic!("option '{}' not found on question {}", content, question_id))
}

pub async fn start_attempt(
    client: &reqwest::Client,
    address: &str,
    token: &str,
    quiz_id: i64,
) -> serde_json::Value {
    let response = client
        .post(format!("{}/api/quizzes/{}/attempts", address, quiz_id))
        .bearer_auth(token)
        .send()
        .await
        .expect("start attempt request failed");
    assert_eq!(response.status().as_u16(), 201, "attempt start rejected");
    response.json().await.unwrap()
}

pub async fn submit_choice(
    client: &reqwest::Client,
    address: &str,
    token: &str,
    attempt_id: i64,
    question_id: i64,
    selected: &[i64],
) -> serde_json::Value {
    let response = client
        .post(format!("{}/api/attempts/{}/answers", address, attempt_id))
        .bearer_auth(token)
        .json(&serde_json::json!({
            "question_id": question_id,
            "answer": {"kind": "choice", "selected_option_ids": selected}
        }))
        .send()
        .await
        .expect("submit answer request failed");
    assert_eq!(response.status().as_u16(), 200, "answer submission rejected");
    response.json().await.unwrap()
}

pub async fn complete_attempt(
    client: &reqwest::Client,
    address: &str,
    token: &str,
    attempt_id: i64,
) -> serde_json::Value {
    let response = client
        .post(format!("{}/api/attempts/{}/complete", address, attempt_id))
        .bearer_auth(token)
        .send()
        .await
        .expect("complete attempt request failed");
    assert_eq!(response.status().as_u16(), 200, "attempt completion rejected");
    response.json().await.unwrap()
}
