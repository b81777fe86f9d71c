//! End-to-end tests for the Edura HTTP API.
//!
//! Each test boots a real server on an ephemeral port and drives it with
//! a plain HTTP client, the way a frontend would.

use std::sync::Arc;

use serde_json::json;

use edura_store::{NewExam, SessionStatus, Store, UserRole};

#[path = "common.rs"]
mod common;

use common::{seed_school, seed_user, spawn_default_server, spawn_server, StubQuiz};

/// Registers a teacher and a student over HTTP, authors a curriculum,
/// walks the student through the lesson gate, takes an exam and checks
/// the mastery overview.
#[tokio::test]
async fn test_full_platform_flow() {
    let server = spawn_default_server().await;
    let (institution, group) = seed_school(&server).await;
    let client = reqwest::Client::new();
    let base = &server.base_url;

    // Teacher registers with the institution short code.
    let response = client
        .post(format!("{base}/auth/register"))
        .json(&json!({
            "email": "teacher@example.com",
            "password": "teacher-pass",
            "fullName": "Tina Teacher",
            "role": "teacher",
            "institutionCode": institution.short_code,
        }))
        .send()
        .await
        .expect("register teacher");
    assert_eq!(response.status(), 201);

    let response = client
        .post(format!("{base}/auth/login"))
        .json(&json!({"email": "teacher@example.com", "password": "teacher-pass"}))
        .send()
        .await
        .expect("login teacher");
    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.expect("login body");
    let teacher_token = body["accessToken"].as_str().expect("token").to_string();

    // Teacher authors a subject with one topic.
    let response = client
        .post(format!("{base}/subjects"))
        .bearer_auth(&teacher_token)
        .json(&json!({"name": "Mathematics"}))
        .send()
        .await
        .expect("create subject");
    assert_eq!(response.status(), 201);
    let subject: serde_json::Value = response.json().await.expect("subject body");
    let subject_id = subject["id"].as_str().expect("subject id").to_string();

    let response = client
        .post(format!("{base}/subjects/{subject_id}/topics"))
        .bearer_auth(&teacher_token)
        .json(&json!({"title": "Fractions", "orderNum": 1}))
        .send()
        .await
        .expect("create topic");
    assert_eq!(response.status(), 201);
    let topic: serde_json::Value = response.json().await.expect("topic body");
    let topic_id = topic["id"].as_str().expect("topic id").to_string();

    // Teacher authors a course with one published, topic-bound lesson.
    let response = client
        .post(format!("{base}/courses"))
        .bearer_auth(&teacher_token)
        .json(&json!({"title": "Math 7"}))
        .send()
        .await
        .expect("create course");
    assert_eq!(response.status(), 201);
    let course: serde_json::Value = response.json().await.expect("course body");
    let course_id = course["id"].as_str().expect("course id").to_string();

    let response = client
        .post(format!("{base}/courses/{course_id}/lessons"))
        .bearer_auth(&teacher_token)
        .json(&json!({
            "title": "Fractions basics",
            "durationMinutes": 30,
            "orderNum": 1,
            "topicId": topic_id,
        }))
        .send()
        .await
        .expect("create lesson");
    assert_eq!(response.status(), 201);
    let lesson: serde_json::Value = response.json().await.expect("lesson body");
    let lesson_id = lesson["id"].as_str().expect("lesson id").to_string();

    let response = client
        .patch(format!("{base}/courses/{course_id}/lessons/{lesson_id}"))
        .bearer_auth(&teacher_token)
        .json(&json!({"isPublished": true}))
        .send()
        .await
        .expect("publish lesson");
    assert_eq!(response.status(), 200);

    // Student registers with the group invite code.
    let response = client
        .post(format!("{base}/auth/register"))
        .json(&json!({
            "email": "student@example.com",
            "password": "student-pass",
            "fullName": "Sam Student",
            "role": "student",
            "inviteCode": group.invite_code,
        }))
        .send()
        .await
        .expect("register student");
    assert_eq!(response.status(), 201);
    let body: serde_json::Value = response.json().await.expect("register body");
    assert_eq!(body["institutionId"], institution.id.to_string());

    let response = client
        .post(format!("{base}/auth/login"))
        .json(&json!({"email": "student@example.com", "password": "student-pass"}))
        .send()
        .await
        .expect("login student");
    let body: serde_json::Value = response.json().await.expect("login body");
    let student_token = body["accessToken"].as_str().expect("token").to_string();

    // The lesson exam is gated until the lesson is completed.
    let exam_uri = format!("{base}/courses/{course_id}/lessons/{lesson_id}/exam");
    let response = client
        .post(&exam_uri)
        .bearer_auth(&student_token)
        .json(&json!({}))
        .send()
        .await
        .expect("gated exam");
    assert_eq!(response.status(), 412);

    let response = client
        .post(format!("{base}/courses/{course_id}/enroll"))
        .bearer_auth(&student_token)
        .send()
        .await
        .expect("enroll");
    assert_eq!(response.status(), 201);

    let response = client
        .post(format!(
            "{base}/courses/{course_id}/lessons/{lesson_id}/progress"
        ))
        .bearer_auth(&student_token)
        .json(&json!({"progressPercent": 150.0}))
        .send()
        .await
        .expect("report progress");
    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.expect("progress body");
    assert_eq!(body["status"], "completed");
    assert_eq!(body["progressPercent"], 100.0);

    // Gate open: generate and check the questions carry no answers.
    let response = client
        .post(&exam_uri)
        .bearer_auth(&student_token)
        .json(&json!({}))
        .send()
        .await
        .expect("generate exam");
    assert_eq!(response.status(), 200);
    let exam: serde_json::Value = response.json().await.expect("exam body");
    let exam_id = exam["examId"].as_str().expect("exam id").to_string();
    assert_eq!(exam["lessonTitle"], "Fractions basics");
    assert_eq!(exam["questions"].as_array().expect("questions").len(), 2);
    assert!(!exam.to_string().contains("correct"));

    // One of two correct: 50%.
    let response = client
        .post(format!("{base}/exams/{exam_id}/submit"))
        .bearer_auth(&student_token)
        .json(&json!({"answers": [
            {"questionIndex": 0, "selectedOption": "3/4"},
            {"questionIndex": 1, "selectedOption": "2/3"},
        ]}))
        .send()
        .await
        .expect("submit exam");
    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.expect("submit body");
    assert_eq!(body["score"], 50.0);
    assert_eq!(body["correctAnswers"], "1/2");
    assert_eq!(body["analysis"]["weak_topics"][0], "Fractions");

    // The mastery overview reflects the attempt.
    let response = client
        .get(format!("{base}/subjects/my-progress"))
        .bearer_auth(&student_token)
        .send()
        .await
        .expect("my progress");
    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.expect("overview body");
    let topic = &body[0]["topics"][0];
    assert_eq!(topic["masteryLevel"], 50.0);
    assert_eq!(topic["attemptsCount"], 1);
}

#[tokio::test]
async fn test_registration_with_unknown_code_persists_nothing() {
    let server = spawn_default_server().await;
    seed_school(&server).await;
    let client = reqwest::Client::new();
    let base = &server.base_url;

    let response = client
        .post(format!("{base}/auth/register"))
        .json(&json!({
            "email": "ghost@example.com",
            "password": "secret-pass",
            "fullName": "Ghost",
            "role": "teacher",
            "institutionCode": "NOPE",
        }))
        .send()
        .await
        .expect("register");
    assert_eq!(response.status(), 422);

    let response = client
        .post(format!("{base}/auth/login"))
        .json(&json!({"email": "ghost@example.com", "password": "secret-pass"}))
        .send()
        .await
        .expect("login");
    assert_eq!(response.status(), 401);
}

#[tokio::test]
async fn test_tampered_token_rejected() {
    let server = spawn_default_server().await;
    let (institution, group) = seed_school(&server).await;
    let (_user, token) = seed_user(
        &server,
        "student@example.com",
        UserRole::Student,
        &institution,
        Some(&group),
    )
    .await;
    let client = reqwest::Client::new();

    let mut tampered = token.clone();
    tampered.push('x');
    let response = client
        .get(format!("{}/subjects", server.base_url))
        .bearer_auth(&tampered)
        .send()
        .await
        .expect("request");
    assert_eq!(response.status(), 401);

    let response = client
        .get(format!("{}/subjects", server.base_url))
        .bearer_auth(&token)
        .send()
        .await
        .expect("request");
    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn test_generation_failure_maps_to_bad_gateway() {
    let server = spawn_server(Arc::new(StubQuiz {
        fail_generate: true,
        ..Default::default()
    }))
    .await;
    let (institution, group) = seed_school(&server).await;
    let (_user, token) = seed_user(
        &server,
        "student@example.com",
        UserRole::Student,
        &institution,
        Some(&group),
    )
    .await;

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

    let client = reqwest::Client::new();
    let response = client
        .post(format!("{}/exams/generate", server.base_url))
        .bearer_auth(&token)
        .json(&json!({"topicId": topic.id}))
        .send()
        .await
        .expect("generate");
    assert_eq!(response.status(), 502);
    let body: serde_json::Value = response.json().await.expect("error body");
    assert!(body["error"].as_str().expect("error").contains("generation failed"));
}

#[tokio::test]
async fn test_exam_without_questions_cannot_be_scored() {
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
    let session = server
        .store
        .find_or_create_testing_session(student.id, subject.id)
        .await
        .expect("session");
    assert_eq!(session.status, SessionStatus::Testing);

    // An exam snapshot that slipped through with no questions.
    let exam = server
        .store
        .create_exam(NewExam {
            session_id: session.id,
            topic_id: topic.id,
            difficulty: 3,
            questions: Vec::new(),
            is_retest: false,
        })
        .await
        .expect("exam");

    let client = reqwest::Client::new();
    let response = client
        .post(format!("{}/exams/{}/submit", server.base_url, exam.id))
        .bearer_auth(&token)
        .json(&json!({"answers": []}))
        .send()
        .await
        .expect("submit");
    assert_eq!(response.status(), 422);
    let body: serde_json::Value = response.json().await.expect("error body");
    assert!(body["error"].as_str().expect("error").contains("no questions"));
}
