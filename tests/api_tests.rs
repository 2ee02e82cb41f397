// tests/api_tests.rs
//
// Integration tests for the authoring surface: quiz and question CRUD,
// publishing, visibility and deletion rules.
//
// These run against a live Postgres instance (DATABASE_URL must be set):
//   cargo test

mod common;

use common::*;

#[tokio::test]
async fn unknown_route_returns_404() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{}/does-not-exist", address))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn api_requires_a_token() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{}/api/quizzes/1", address))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 401);
}

#[tokio::test]
async fn authoring_is_admin_only() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let learner = learner_token(unique_id());

    let response = client
        .post(format!("{}/api/quizzes", address))
        .bearer_auth(&learner)
        .json(&serde_json::json!({
            "lesson_id": unique_id(),
            "title": "Tiltott kvíz"
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 403);
}

#[tokio::test]
async fn create_quiz_rejects_out_of_range_passing_score() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let admin = admin_token();

    let response = client
        .post(format!("{}/api/quizzes", address))
        .bearer_auth(&admin)
        .json(&serde_json::json!({
            "lesson_id": unique_id(),
            "title": "Hibás kvíz",
            "passing_score": 150.0
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 400);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["kind"], "validation");
}

#[tokio::test]
async fn multiple_choice_question_needs_a_correct_option() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let admin = admin_token();

    let quiz = create_quiz(
        &client,
        &address,
        &admin,
        serde_json::json!({"lesson_id": unique_id(), "title": "Opciók nélkül"}),
    )
    .await;
    let quiz_id = quiz["id"].as_i64().unwrap();

    // No option flagged correct.
    let response = client
        .post(format!("{}/api/quiz-questions", address))
        .bearer_auth(&admin)
        .json(&serde_json::json!({
            "quiz_id": quiz_id,
            "prompt": "Melyik?",
            "position": 1,
            "type": "multiple_choice",
            "options": [
                {"content": "A", "is_correct": false, "position": 0},
                {"content": "B", "is_correct": false, "position": 1}
            ]
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 400);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["kind"], "validation");
}

#[tokio::test]
async fn duplicate_question_position_is_a_conflict() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let admin = admin_token();

    let quiz = create_quiz(
        &client,
        &address,
        &admin,
        serde_json::json!({"lesson_id": unique_id(), "title": "Pozíció ütközés"}),
    )
    .await;
    let quiz_id = quiz["id"].as_i64().unwrap();

    let question = serde_json::json!({
        "quiz_id": quiz_id,
        "prompt": "Igaz vagy hamis?",
        "position": 1,
        "type": "true_false",
        "options": [
            {"content": "Igaz", "is_correct": true, "position": 0},
            {"content": "Hamis", "is_correct": false, "position": 1}
        ]
    });

    create_question(&client, &address, &admin, question.clone()).await;

    let response = client
        .post(format!("{}/api/quiz-questions", address))
        .bearer_auth(&admin)
        .json(&question)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 409);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["kind"], "conflict");
}

#[tokio::test]
async fn publish_requires_at_least_one_question() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let admin = admin_token();

    let quiz = create_quiz(
        &client,
        &address,
        &admin,
        serde_json::json!({"lesson_id": unique_id(), "title": "Üres kvíz"}),
    )
    .await;
    let quiz_id = quiz["id"].as_i64().unwrap();

    let response = client
        .post(format!("{}/api/quizzes/{}/publish", address, quiz_id))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 400);

    create_question(
        &client,
        &address,
        &admin,
        serde_json::json!({
            "quiz_id": quiz_id,
            "prompt": "Igaz?",
            "position": 1,
            "type": "true_false",
            "options": [
                {"content": "Igaz", "is_correct": true, "position": 0},
                {"content": "Hamis", "is_correct": false, "position": 1}
            ]
        }),
    )
    .await;

    publish_quiz(&client, &address, &admin, quiz_id).await;
}

#[tokio::test]
async fn draft_quizzes_are_hidden_from_learners() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let admin = admin_token();
    let learner = learner_token(unique_id());

    let lesson_id = unique_id();
    let quiz = create_quiz(
        &client,
        &address,
        &admin,
        serde_json::json!({"lesson_id": lesson_id, "title": "Vázlat kvíz"}),
    )
    .await;
    let quiz_id = quiz["id"].as_i64().unwrap();
    assert_eq!(quiz["status"], "draft");

    // Admin listing sees the draft.
    let admin_list: serde_json::Value = client
        .get(format!("{}/api/lessons/{}/quizzes", address, lesson_id))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(admin_list.as_array().unwrap().len(), 1);

    // Learner listing does not.
    let learner_list: serde_json::Value = client
        .get(format!("{}/api/lessons/{}/quizzes", address, lesson_id))
        .bearer_auth(&learner)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(learner_list.as_array().unwrap().is_empty());

    // Direct fetch reads as missing, not forbidden.
    let response = client
        .get(format!("{}/api/quizzes/{}", address, quiz_id))
        .bearer_auth(&learner)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn learner_quiz_view_hides_correct_answers() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let admin = admin_token();
    let learner = learner_token(unique_id());

    let (quiz_id, q1_id, _) =
        seed_two_question_quiz(&client, &address, &admin, serde_json::json!({})).await;

    let learner_view = fetch_public_quiz(&client, &address, &learner, quiz_id).await;
    let question = learner_view["questions"]
        .as_array()
        .unwrap()
        .iter()
        .find(|q| q["id"].as_i64() == Some(q1_id))
        .unwrap();
    for option in question["options"].as_array().unwrap() {
        assert!(
            option.get("is_correct").is_none(),
            "learner view leaked is_correct: {option}"
        );
    }
    assert!(question.get("settings").is_none());

    // The authoring view keeps the flags.
    let admin_view = fetch_public_quiz(&client, &address, &admin, quiz_id).await;
    let question = admin_view["questions"]
        .as_array()
        .unwrap()
        .iter()
        .find(|q| q["id"].as_i64() == Some(q1_id))
        .unwrap();
    assert!(
        question["options"]
            .as_array()
            .unwrap()
            .iter()
            .any(|o| o["is_correct"] == true)
    );
}

#[tokio::test]
async fn update_quiz_changes_only_sent_fields() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let admin = admin_token();

    let quiz = create_quiz(
        &client,
        &address,
        &admin,
        serde_json::json!({
            "lesson_id": unique_id(),
            "title": "Eredeti cím",
            "max_attempts": 5
        }),
    )
    .await;
    let quiz_id = quiz["id"].as_i64().unwrap();

    let response = client
        .put(format!("{}/api/quizzes/{}", address, quiz_id))
        .bearer_auth(&admin)
        .json(&serde_json::json!({"title": "Új cím"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);

    let updated = fetch_public_quiz(&client, &address, &admin, quiz_id).await;
    assert_eq!(updated["title"], "Új cím");
    assert_eq!(updated["max_attempts"], 5);
}

#[tokio::test]
async fn quiz_deletion_blocked_by_open_attempt_then_allowed() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let admin = admin_token();
    let learner_id = unique_id();
    let learner = learner_token(learner_id);

    let (quiz_id, q1_id, q2_id) =
        seed_two_question_quiz(&client, &address, &admin, serde_json::json!({})).await;

    let attempt = start_attempt(&client, &address, &learner, quiz_id).await;
    let attempt_id = attempt["id"].as_i64().unwrap();

    // Open attempt blocks deletion.
    let response = client
        .delete(format!("{}/api/quizzes/{}", address, quiz_id))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 409);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["kind"], "conflict");

    // Finish the attempt, then deletion goes through.
    let detail = fetch_public_quiz(&client, &address, &learner, quiz_id).await;
    let budapest = option_id(&detail, q1_id, "Budapest");
    let igaz = option_id(&detail, q2_id, "Igaz");
    submit_choice(&client, &address, &learner, attempt_id, q1_id, &[budapest]).await;
    submit_choice(&client, &address, &learner, attempt_id, q2_id, &[igaz]).await;
    complete_attempt(&client, &address, &learner, attempt_id).await;

    let response = client
        .delete(format!("{}/api/quizzes/{}", address, quiz_id))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 204);

    // The result outlives the quiz.
    let response = client
        .get(format!("{}/api/attempts/{}/result", address, attempt_id))
        .bearer_auth(&learner)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["results_visible"], true);
    assert_eq!(body["result"]["passed"], true);
}

#[tokio::test]
async fn deleting_a_question_cascades_to_its_options() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let admin = admin_token();

    let (quiz_id, q1_id, _) =
        seed_two_question_quiz(&client, &address, &admin, serde_json::json!({})).await;

    let response = client
        .delete(format!("{}/api/quiz-questions/{}", address, q1_id))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 204);

    let detail = fetch_public_quiz(&client, &address, &admin, quiz_id).await;
    assert_eq!(detail["questions"].as_array().unwrap().len(), 1);
}
