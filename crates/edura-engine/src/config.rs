//! Engine configuration.
//!
//! Loaded from an optional JSON file; every field has a development
//! default so the platform boots with no config at all. Values are
//! validated once at startup, never per-request.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// Engine configuration, typically loaded from `edura.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Base URL of the OpenAI-compatible quiz generator.
    #[serde(default = "default_generator_url")]
    pub generator_url: String,

    /// Model name passed to the generator.
    #[serde(default = "default_generator_model")]
    pub generator_model: String,

    /// Optional bearer token for the generator endpoint.
    #[serde(default)]
    pub generator_api_key: Option<String>,

    /// Per-request generation timeout in seconds.
    #[serde(default = "default_generation_timeout_secs")]
    pub generation_timeout_secs: u64,

    /// Number of questions requested per exam.
    #[serde(default = "default_questions_per_exam")]
    pub questions_per_exam: u8,

    /// Difficulty used when a request does not specify one, 1-5.
    #[serde(default = "default_difficulty")]
    pub default_difficulty: u8,

    /// Secret used to sign access tokens.
    #[serde(default = "default_token_secret")]
    pub token_secret: String,

    /// Access token lifetime in minutes.
    #[serde(default = "default_token_ttl_minutes")]
    pub token_ttl_minutes: i64,
}

fn default_generator_url() -> String {
    "http://localhost:11434/v1".to_string()
}

fn default_generator_model() -> String {
    "gpt-4o-mini".to_string()
}

const fn default_generation_timeout_secs() -> u64 {
    60
}

const fn default_questions_per_exam() -> u8 {
    3
}

const fn default_difficulty() -> u8 {
    3
}

fn default_token_secret() -> String {
    "edura-dev-secret-change-me".to_string()
}

const fn default_token_ttl_minutes() -> i64 {
    30
}

impl Default for Config {
    fn default() -> Self {
        Self {
            generator_url: default_generator_url(),
            generator_model: default_generator_model(),
            generator_api_key: None,
            generation_timeout_secs: default_generation_timeout_secs(),
            questions_per_exam: default_questions_per_exam(),
            default_difficulty: default_difficulty(),
            token_secret: default_token_secret(),
            token_ttl_minutes: default_token_ttl_minutes(),
        }
    }
}

impl Config {
    /// Loads configuration from a JSON file, falling back to defaults when
    /// the file does not exist.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path).map_err(|e| EngineError::ConfigParse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        let config: Self =
            serde_json::from_str(&contents).map_err(|e| EngineError::ConfigParse {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;

        config.validate()?;
        Ok(config)
    }

    /// Validates configuration values.
    pub fn validate(&self) -> Result<()> {
        if self.generator_url.trim().is_empty() {
            return Err(EngineError::config_validation(
                "generatorUrl must not be empty",
                "point it at an OpenAI-compatible endpoint such as http://localhost:11434/v1",
            ));
        }
        if self.generation_timeout_secs == 0 {
            return Err(EngineError::config_validation(
                "generationTimeoutSecs must be greater than zero",
                "use a value like 60",
            ));
        }
        if self.questions_per_exam == 0 {
            return Err(EngineError::config_validation(
                "questionsPerExam must be greater than zero",
                "use a value like 3",
            ));
        }
        if !(1..=5).contains(&self.default_difficulty) {
            return Err(EngineError::config_validation(
                "defaultDifficulty must be between 1 and 5",
                "use 3 for a medium default",
            ));
        }
        if self.token_secret.trim().is_empty() {
            return Err(EngineError::config_validation(
                "tokenSecret must not be empty",
                "generate a random secret and keep it out of version control",
            ));
        }
        if self.token_ttl_minutes <= 0 {
            return Err(EngineError::config_validation(
                "tokenTtlMinutes must be greater than zero",
                "use a value like 30",
            ));
        }
        Ok(())
    }
}
