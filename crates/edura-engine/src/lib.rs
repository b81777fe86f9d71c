//! Edura platform engine
//!
//! Domain logic for the adaptive exam platform: registration and login,
//! course and lesson progress, exam generation, scoring, mastery tracking,
//! and the HTTP API that exposes it all.
//!
//! The engine is assembled from three collaborators behind traits: a
//! [`Store`](edura_store::Store) for persistence, a
//! [`QuizService`](edura_quizgen::QuizService) for AI generation, and a
//! [`CredentialService`](auth::CredentialService) for tokens and password
//! digests. [`Platform`] ties them together; [`api::create_router`] serves
//! them over HTTP.

pub mod api;
pub mod auth;
pub mod config;
pub mod engine;
pub mod error;
pub mod progress;
pub mod registration;

use std::sync::Arc;

use edura_quizgen::QuizService;
use edura_store::Store;

pub use api::{create_router, AppState};
pub use auth::{Claims, CredentialService, HmacCredentials};
pub use config::Config;
pub use engine::{score_answers, GeneratedExam, SubmissionOutcome};
pub use error::{EngineError, Result};
pub use progress::{apply_progress, SubjectProgress, TopicProgress};
pub use registration::NewRegistration;

/// The assembled platform: persistence, quiz generation and credentials
/// behind one handle. Cheap to clone.
#[derive(Clone)]
pub struct Platform {
    pub(crate) store: Arc<dyn Store>,
    pub(crate) quiz: Arc<dyn QuizService>,
    pub(crate) credentials: Arc<dyn CredentialService>,
}

impl Platform {
    /// Assembles a platform from its collaborators.
    #[must_use]
    pub fn new(
        store: Arc<dyn Store>,
        quiz: Arc<dyn QuizService>,
        credentials: Arc<dyn CredentialService>,
    ) -> Self {
        Self {
            store,
            quiz,
            credentials,
        }
    }

    /// The persistence backend.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    /// The credential service.
    #[must_use]
    pub fn credentials(&self) -> &Arc<dyn CredentialService> {
        &self.credentials
    }
}

#[cfg(test)]
pub(crate) mod test_support;
