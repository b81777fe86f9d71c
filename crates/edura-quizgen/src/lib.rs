//! Edura quiz generation collaborator
//!
//! The external AI producer behind exam generation and error analysis.
//! [`QuizService`] is the trait the engine consumes; [`OpenAiQuizService`]
//! is the production implementation speaking to any OpenAI-compatible
//! chat-completion endpoint.
//!
//! Generation failures are fatal to exam creation (no partial exam is
//! persisted); analysis failures are expected to be swallowed by the
//! caller, so this crate only reports them.

pub mod client;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use edura_store::{Question, SubmittedAnswer};

pub use client::OpenAiQuizService;

/// A specialized `Result` type for generation operations.
pub type Result<T> = std::result::Result<T, GenerationError>;

/// Errors produced by the quiz generation collaborator.
///
/// Variants carry actionable suggestions so operators can tell an
/// unreachable endpoint apart from a model that stopped following the
/// output contract.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    /// The upstream endpoint rejected the request or was unreachable.
    #[error("quiz generator unreachable: {0}\n\nSuggestion: check the generator URL and that the model server is running")]
    Upstream(String),

    /// The call exceeded the configured timeout.
    #[error("quiz generator timed out after {timeout_secs}s\n\nSuggestion: raise the generation timeout or retry later")]
    Timeout {
        /// The timeout that was exceeded, in seconds.
        timeout_secs: u64,
    },

    /// The model's reply could not be parsed as the expected JSON.
    #[error("quiz generator returned malformed output: {0}\n\nSuggestion: the model must reply with bare JSON and no surrounding prose")]
    Malformed(String),

    /// The reply parsed but a question violated the shape contract.
    #[error("generated question {index} is invalid: {message}")]
    InvalidShape {
        /// Zero-based index of the offending question.
        index: usize,
        /// What was wrong with it.
        message: String,
    },
}

impl GenerationError {
    /// Returns `true` if retrying the same request later could succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Upstream(_) | Self::Timeout { .. })
    }
}

/// AI-produced error analysis for a scored submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Analysis {
    /// Plain-language breakdown of the mistakes.
    pub explanation: String,
    /// Topics the student appears weak on.
    #[serde(default)]
    pub weak_topics: Vec<String>,
    /// What to revisit next.
    pub recommendation: String,
}

/// The generative collaborator consumed by the exam engine.
#[async_trait]
pub trait QuizService: Send + Sync {
    /// Generates an ordered sequence of well-formed questions for a topic.
    ///
    /// Every returned question satisfies
    /// [`Question::is_well_formed`](edura_store::Question::is_well_formed);
    /// an empty sequence is an error, never an empty exam.
    async fn generate(&self, topic_name: &str, difficulty: u8) -> Result<Vec<Question>>;

    /// Produces an error analysis for a submission.
    ///
    /// Failures here are non-fatal to the caller by contract.
    async fn analyze(
        &self,
        topic_name: &str,
        questions: &[Question],
        answers: &[SubmittedAnswer],
    ) -> Result<Analysis>;
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(GenerationError::Upstream("connection refused".to_string()).is_transient());
        assert!(GenerationError::Timeout { timeout_secs: 30 }.is_transient());
        assert!(!GenerationError::Malformed("not json".to_string()).is_transient());
        assert!(!GenerationError::InvalidShape {
            index: 0,
            message: "one option".to_string()
        }
        .is_transient());
    }

    #[test]
    fn test_error_display_carries_suggestion() {
        let err = GenerationError::Timeout { timeout_secs: 30 };
        let msg = err.to_string();
        assert!(msg.contains("30s"));
        assert!(msg.contains("Suggestion"));
    }

    #[test]
    fn test_analysis_weak_topics_default_to_empty() {
        let json = r#"{"explanation": "all correct", "recommendation": "keep going"}"#;
        let analysis: Analysis = serde_json::from_str(json).unwrap();
        assert!(analysis.weak_topics.is_empty());
        assert_eq!(analysis.recommendation, "keep going");
    }
}
