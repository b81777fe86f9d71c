//! Shared harness for end-to-end tests: boots the real HTTP server on an
//! ephemeral port with an in-memory store and a canned quiz service.
#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;

use edura_engine::{create_router, AppState, Config, HmacCredentials, Platform};
use edura_quizgen::{Analysis, GenerationError, QuizService};
use edura_store::{
    Group, Institution, MemoryStore, NewGroup, NewProfile, NewUser, Question, Store,
    SubmittedAnswer, User, UserRole,
};

/// A running server plus direct handles for assertions.
pub struct TestServer {
    /// Base URL including the `/api` prefix.
    pub base_url: String,
    pub platform: Platform,
    pub store: Arc<MemoryStore>,
}

/// Two fixed, well-formed fraction questions served by [`StubQuiz`].
pub fn fraction_questions() -> Vec<Question> {
    vec![
        Question {
            prompt: "What is 1/2 + 1/4?".to_string(),
            options: vec![
                "1/4".to_string(),
                "2/6".to_string(),
                "3/4".to_string(),
                "1".to_string(),
            ],
            correct_option: "3/4".to_string(),
        },
        Question {
            prompt: "Which fraction equals 0.5?".to_string(),
            options: vec!["1/3".to_string(), "1/2".to_string(), "2/3".to_string()],
            correct_option: "1/2".to_string(),
        },
    ]
}

/// Deterministic quiz service with failure switches.
#[derive(Default)]
pub struct StubQuiz {
    pub fail_generate: bool,
    pub fail_analyze: bool,
}

#[async_trait]
impl QuizService for StubQuiz {
    async fn generate(
        &self,
        _topic_name: &str,
        _difficulty: u8,
    ) -> edura_quizgen::Result<Vec<Question>> {
        if self.fail_generate {
            return Err(GenerationError::Upstream("connection refused".to_string()));
        }
        Ok(fraction_questions())
    }

    async fn analyze(
        &self,
        _topic_name: &str,
        _questions: &[Question],
        _answers: &[SubmittedAnswer],
    ) -> edura_quizgen::Result<Analysis> {
        if self.fail_analyze {
            return Err(GenerationError::Timeout { timeout_secs: 1 });
        }
        Ok(Analysis {
            explanation: "You mixed up denominators.".to_string(),
            weak_topics: vec!["Fractions".to_string()],
            recommendation: "Revisit adding fractions with unlike denominators.".to_string(),
        })
    }
}

/// Boots the API server on an ephemeral port with the given quiz service.
pub async fn spawn_server(quiz: Arc<dyn QuizService>) -> TestServer {
    let store = Arc::new(MemoryStore::new());
    let credentials = Arc::new(HmacCredentials::new("integration-secret", 30));
    let platform = Platform::new(store.clone(), quiz, credentials);

    let router = create_router(AppState::new(Config::default(), platform.clone()));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral port");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("serve");
    });

    TestServer {
        base_url: format!("http://{addr}/api"),
        platform,
        store,
    }
}

/// Boots a server with a well-behaved quiz service.
pub async fn spawn_default_server() -> TestServer {
    spawn_server(Arc::new(StubQuiz::default())).await
}

/// Creates an institution and a student group with a fixed invite code.
pub async fn seed_school(server: &TestServer) -> (Institution, Group) {
    let institution = server
        .store
        .create_institution("Test School", "TST")
        .await
        .expect("create institution");
    let group = server
        .store
        .create_group(NewGroup {
            name: "7A".to_string(),
            institution_id: institution.id,
            teacher_id: None,
            invite_code: "JOIN7A22".to_string(),
        })
        .await
        .expect("create group");
    (institution, group)
}

/// Creates a user directly in the store and returns it with a valid token.
pub async fn seed_user(
    server: &TestServer,
    email: &str,
    role: UserRole,
    institution: &Institution,
    group: Option<&Group>,
) -> (User, String) {
    let profile = match role {
        UserRole::Teacher => NewProfile::Teacher,
        UserRole::Student => NewProfile::Student {
            group_id: group.expect("student needs a group").id,
        },
    };
    let password_hash = server
        .platform
        .credentials()
        .hash_password("seeded-pass")
        .expect("hash password");
    let user = server
        .store
        .create_user(NewUser {
            email: email.to_string(),
            password_hash,
            full_name: "Seeded User".to_string(),
            role,
            institution_id: institution.id,
            profile,
        })
        .await
        .expect("create user");
    let token = server
        .platform
        .credentials()
        .issue_token(&user)
        .expect("issue token");
    (user, token)
}
