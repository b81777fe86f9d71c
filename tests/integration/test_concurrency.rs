//! Concurrency tests: racing submissions and session creation must not
//! duplicate mastery rows or learning sessions.

use serde_json::json;
use uuid::Uuid;

use edura_store::{Store, UserRole};

#[path = "common.rs"]
mod common;

use common::{seed_school, seed_user, spawn_default_server, TestServer};

async fn seed_topic(server: &TestServer) -> Uuid {
    let subject = server
        .store
        .create_subject("Mathematics", None)
        .await
        .expect("subject");
    let topic = server
        .store
        .create_topic(edura_store::NewTopic {
            subject_id: subject.id,
            parent_id: None,
            title: "Fractions".to_string(),
            order_num: 1,
        })
        .await
        .expect("topic");
    topic.id
}

#[tokio::test]
async fn test_concurrent_submissions_yield_one_mastery_row() {
    let server = spawn_default_server().await;
    let (institution, group) = seed_school(&server).await;
    let (student, token) = seed_user(
        &server,
        "student@example.com",
        UserRole::Student,
        &institution,
        Some(&group),
    )
    .await;
    let topic_id = seed_topic(&server).await;

    let client = reqwest::Client::new();
    let response = client
        .post(format!("{}/exams/generate", server.base_url))
        .bearer_auth(&token)
        .json(&json!({"topicId": topic_id}))
        .send()
        .await
        .expect("generate");
    assert_eq!(response.status(), 200);
    let exam: serde_json::Value = response.json().await.expect("exam body");
    let exam_id = exam["examId"].as_str().expect("exam id").to_string();

    let submit_uri = format!("{}/exams/{exam_id}/submit", server.base_url);
    let mut handles = Vec::new();
    for _ in 0..8 {
        let client = client.clone();
        let uri = submit_uri.clone();
        let token = token.clone();
        handles.push(tokio::spawn(async move {
            client
                .post(uri)
                .bearer_auth(token)
                .json(&json!({"answers": [
                    {"questionIndex": 0, "selectedOption": "3/4"},
                    {"questionIndex": 1, "selectedOption": "1/2"},
                ]}))
                .send()
                .await
                .expect("submit")
                .status()
        }));
    }
    for handle in handles {
        assert_eq!(handle.await.expect("join"), 200);
    }

    // Exactly one mastery row, counting every attempt.
    let masteries = server
        .store
        .masteries_for_student(student.id)
        .await
        .expect("masteries");
    let rows: Vec<_> = masteries.iter().filter(|m| m.topic_id == topic_id).collect();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].attempts_count, 8);
    assert_eq!(rows[0].mastery_level, 100.0);

    let attempts = server
        .store
        .attempts_for_topic(student.id, topic_id)
        .await
        .expect("attempts");
    assert_eq!(attempts.len(), 8);
}

#[tokio::test]
async fn test_concurrent_generation_shares_one_session() {
    let server = spawn_default_server().await;
    let (institution, group) = seed_school(&server).await;
    let (_student, token) = seed_user(
        &server,
        "student@example.com",
        UserRole::Student,
        &institution,
        Some(&group),
    )
    .await;
    let topic_id = seed_topic(&server).await;

    let client = reqwest::Client::new();
    let generate_uri = format!("{}/exams/generate", server.base_url);
    let mut handles = Vec::new();
    for _ in 0..4 {
        let client = client.clone();
        let uri = generate_uri.clone();
        let token = token.clone();
        handles.push(tokio::spawn(async move {
            let response = client
                .post(uri)
                .bearer_auth(token)
                .json(&json!({"topicId": topic_id}))
                .send()
                .await
                .expect("generate");
            assert_eq!(response.status(), 200);
            let body: serde_json::Value = response.json().await.expect("exam body");
            body["examId"].as_str().expect("exam id").to_string()
        }));
    }

    let mut session_ids = std::collections::HashSet::new();
    for handle in handles {
        let exam_id: Uuid = handle.await.expect("join").parse().expect("uuid");
        let exam = server
            .store
            .exam(exam_id)
            .await
            .expect("lookup")
            .expect("exam exists");
        session_ids.insert(exam.session_id);
    }
    assert_eq!(session_ids.len(), 1, "all exams share one testing session");
}
