//! Error types for the Edura engine.
//!
//! Every fallible engine operation returns [`EngineError`]; the API layer
//! maps each variant to an HTTP status in one place. Store errors are
//! converted at the boundary so handlers can use `?` on store calls and
//! still produce the right status code.

use edura_quizgen::GenerationError;
use edura_store::StoreError;
use uuid::Uuid;

/// A specialized `Result` type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors produced by engine operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// A referenced entity does not exist.
    #[error("{entity} not found")]
    NotFound {
        /// The entity kind that was missing.
        entity: &'static str,
    },

    /// The request payload was structurally valid but semantically wrong.
    #[error("validation failed: {message}")]
    Validation {
        /// What was wrong with the input.
        message: String,
    },

    /// The target exists but is not in a state that permits the operation.
    #[error("precondition failed: {message}")]
    PreconditionFailed {
        /// Which precondition was not met.
        message: String,
    },

    /// Authored content is missing a required linkage.
    #[error("content misconfigured: {message}\n\nSuggestion: {suggestion}")]
    ContentMisconfigured {
        /// What is missing.
        message: String,
        /// How an author can fix it.
        suggestion: String,
    },

    /// An insert violated a uniqueness constraint.
    #[error("{entity} with {field} '{value}' already exists")]
    Conflict {
        /// The entity kind.
        entity: &'static str,
        /// The constrained field.
        field: &'static str,
        /// The conflicting value.
        value: String,
    },

    /// Credentials or token failed verification.
    #[error("unauthorized: {message}")]
    Unauthorized {
        /// Why authentication failed.
        message: String,
    },

    /// The caller is authenticated but lacks the role for this operation.
    #[error("forbidden: {message}")]
    Forbidden {
        /// Which role the operation requires.
        message: String,
    },

    /// The quiz generation collaborator failed; no exam was persisted.
    #[error("exam generation failed: {source}")]
    GenerationFailed {
        /// The underlying generation error.
        #[source]
        source: GenerationError,
    },

    /// A persisted exam has no questions and cannot be scored.
    #[error("exam {exam_id} has no questions and cannot be scored")]
    InvalidExam {
        /// The unsuitable exam.
        exam_id: Uuid,
    },

    /// A configuration file existed but could not be parsed.
    #[error("failed to parse config file '{path}': {message}\n\nSuggestion: check the file is valid JSON; delete it to fall back to defaults")]
    ConfigParse {
        /// Path of the offending file.
        path: String,
        /// The parse failure.
        message: String,
    },

    /// A configuration value failed validation.
    #[error("invalid configuration: {message}\n\nSuggestion: {suggestion}")]
    ConfigValidation {
        /// What was invalid.
        message: String,
        /// How to fix it.
        suggestion: String,
    },
}

impl EngineError {
    /// Creates a new `NotFound` error for the given entity kind.
    #[must_use]
    pub const fn not_found(entity: &'static str) -> Self {
        Self::NotFound { entity }
    }

    /// Creates a new `Validation` error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Creates a new `PreconditionFailed` error.
    pub fn precondition(message: impl Into<String>) -> Self {
        Self::PreconditionFailed {
            message: message.into(),
        }
    }

    /// Creates a new `ContentMisconfigured` error.
    pub fn misconfigured(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::ContentMisconfigured {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Creates a new `Unauthorized` error.
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized {
            message: message.into(),
        }
    }

    /// Creates a new `Forbidden` error.
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden {
            message: message.into(),
        }
    }

    /// Creates a new `ConfigValidation` error.
    pub fn config_validation(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::ConfigValidation {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Returns `true` if the error is attributable to the caller's request
    /// rather than the platform.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::NotFound { .. }
                | Self::Validation { .. }
                | Self::PreconditionFailed { .. }
                | Self::ContentMisconfigured { .. }
                | Self::Conflict { .. }
                | Self::Unauthorized { .. }
                | Self::Forbidden { .. }
                | Self::InvalidExam { .. }
        )
    }
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { entity } => Self::NotFound { entity },
            StoreError::Conflict {
                entity,
                field,
                value,
            } => Self::Conflict {
                entity,
                field,
                value,
            },
        }
    }
}

impl From<GenerationError> for EngineError {
    fn from(source: GenerationError) -> Self {
        Self::GenerationFailed { source }
    }
}
