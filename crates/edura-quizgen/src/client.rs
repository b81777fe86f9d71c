//! OpenAI-compatible chat client for quiz and analysis generation.
//!
//! Works against any endpoint implementing the `/chat/completions`
//! contract (LM Studio, Ollama, the hosted APIs). The model is instructed
//! to reply with bare JSON; replies wrapped in Markdown code fences are
//! tolerated and unwrapped before parsing.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use edura_store::{Question, SubmittedAnswer};

use crate::{Analysis, GenerationError, QuizService, Result};

/// Default per-call timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Default number of questions requested per quiz.
const DEFAULT_QUESTION_COUNT: u8 = 3;

/// Sampling temperature for question generation. Low, for format discipline.
const GENERATE_TEMPERATURE: f64 = 0.2;

/// Sampling temperature for analysis generation.
const ANALYZE_TEMPERATURE: f64 = 0.3;

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f64,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

/// Question shape the model is asked to produce.
#[derive(Debug, Deserialize)]
struct RawQuestion {
    question: String,
    options: Vec<String>,
    correct_answer: String,
}

// ============================================================================
// Client
// ============================================================================

/// [`QuizService`] implementation over an OpenAI-compatible HTTP endpoint.
///
/// # Example
///
/// ```no_run
/// use edura_quizgen::{OpenAiQuizService, QuizService};
///
/// # async fn example() -> Result<(), edura_quizgen::GenerationError> {
/// let service = OpenAiQuizService::new("http://localhost:1234/v1", "local-model")
///     .with_timeout_secs(30)
///     .with_question_count(5);
/// let questions = service.generate("Derivatives", 3).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct OpenAiQuizService {
    http: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    timeout_secs: u64,
    question_count: u8,
}

impl OpenAiQuizService {
    /// Creates a client for the given endpoint base URL and model name.
    #[must_use]
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            model: model.into(),
            api_key: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            question_count: DEFAULT_QUESTION_COUNT,
        }
    }

    /// Sets the bearer token sent to the endpoint.
    #[must_use]
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Sets the per-call timeout in seconds.
    #[must_use]
    pub const fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Sets how many questions each quiz requests.
    #[must_use]
    pub const fn with_question_count(mut self, question_count: u8) -> Self {
        self.question_count = question_count;
        self
    }

    /// Sends one chat completion request and returns the reply content.
    async fn complete(&self, messages: Vec<ChatMessage>, temperature: f64) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        let request = ChatRequest {
            model: self.model.clone(),
            messages,
            temperature,
        };

        let mut builder = self
            .http
            .post(&url)
            .timeout(Duration::from_secs(self.timeout_secs))
            .json(&request);
        if let Some(ref api_key) = self.api_key {
            builder = builder.bearer_auth(api_key);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                GenerationError::Timeout {
                    timeout_secs: self.timeout_secs,
                }
            } else {
                GenerationError::Upstream(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, "Quiz generator returned error status");
            return Err(GenerationError::Upstream(format!(
                "endpoint returned {status}: {body}"
            )));
        }

        let reply: ChatResponse = response
            .json()
            .await
            .map_err(|e| GenerationError::Malformed(e.to_string()))?;

        reply
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| GenerationError::Malformed("reply contained no choices".to_string()))
    }
}

#[async_trait::async_trait]
impl QuizService for OpenAiQuizService {
    #[instrument(skip(self), fields(model = %self.model))]
    async fn generate(&self, topic_name: &str, difficulty: u8) -> Result<Vec<Question>> {
        let prompt = generate_prompt(topic_name, difficulty, self.question_count);
        let messages = vec![
            ChatMessage {
                role: "system",
                content: "You are an AI tutor. You reply strictly in JSON format.".to_string(),
            },
            ChatMessage {
                role: "user",
                content: prompt,
            },
        ];

        let content = self.complete(messages, GENERATE_TEMPERATURE).await?;
        let questions = parse_questions(&content)?;

        debug!(
            topic = topic_name,
            count = questions.len(),
            "Generated quiz questions"
        );
        Ok(questions)
    }

    #[instrument(skip(self, questions, answers), fields(model = %self.model))]
    async fn analyze(
        &self,
        topic_name: &str,
        questions: &[Question],
        answers: &[SubmittedAnswer],
    ) -> Result<Analysis> {
        let prompt = analyze_prompt(topic_name, questions, answers)?;
        let messages = vec![ChatMessage {
            role: "user",
            content: prompt,
        }];

        let content = self.complete(messages, ANALYZE_TEMPERATURE).await?;
        serde_json::from_str(strip_code_fences(&content))
            .map_err(|e| GenerationError::Malformed(e.to_string()))
    }
}

// ============================================================================
// Prompts & parsing
// ============================================================================

/// Builds the question-generation prompt.
fn generate_prompt(topic_name: &str, difficulty: u8, question_count: u8) -> String {
    format!(
        "Generate a quiz of {question_count} questions on the topic '{topic_name}'. \
         Difficulty level: {difficulty} out of 5.\n\
         REPLY WITH A VALID JSON ARRAY ONLY. No text before or after the JSON.\n\
         The format is strictly:\n\
         [\n  {{\n    \"question\": \"question text\",\n    \
         \"options\": [\"option1\", \"option2\", \"option3\", \"option4\"],\n    \
         \"correct_answer\": \"option1\"\n  }}\n]"
    )
}

/// Builds the error-analysis prompt.
fn analyze_prompt(
    topic_name: &str,
    questions: &[Question],
    answers: &[SubmittedAnswer],
) -> Result<String> {
    let questions_json =
        serde_json::to_string(questions).map_err(|e| GenerationError::Malformed(e.to_string()))?;
    let answers_json =
        serde_json::to_string(answers).map_err(|e| GenerationError::Malformed(e.to_string()))?;

    Ok(format!(
        "A student took a quiz on the topic '{topic_name}'.\n\
         Questions with correct answers: {questions_json}\n\
         The student's answers: {answers_json}\n\n\
         Find the mistakes, explain in plain language why each wrong answer is \
         wrong, and give one recommendation on what exactly to revisit.\n\
         Reply strictly in JSON format:\n\
         {{\n  \"explanation\": \"overall breakdown of the mistakes\",\n  \
         \"weak_topics\": [\"topic 1\", \"topic 2\"],\n  \
         \"recommendation\": \"advice for the student\"\n}}"
    ))
}

/// Removes a surrounding Markdown code fence, if present.
fn strip_code_fences(content: &str) -> &str {
    let trimmed = content.trim();
    let without_open = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    without_open
        .strip_suffix("```")
        .unwrap_or(without_open)
        .trim()
}

/// Parses and validates the model's question array.
fn parse_questions(content: &str) -> Result<Vec<Question>> {
    let raw: Vec<RawQuestion> = serde_json::from_str(strip_code_fences(content))
        .map_err(|e| GenerationError::Malformed(e.to_string()))?;

    if raw.is_empty() {
        return Err(GenerationError::Malformed(
            "model returned an empty question list".to_string(),
        ));
    }

    let questions: Vec<Question> = raw
        .into_iter()
        .map(|q| Question {
            prompt: q.question,
            options: q.options,
            correct_option: q.correct_answer,
        })
        .collect();

    for (index, question) in questions.iter().enumerate() {
        if !question.is_well_formed() {
            return Err(GenerationError::InvalidShape {
                index,
                message: format!(
                    "expected at least two options containing the correct one, got {} options with correct '{}'",
                    question.options.len(),
                    question.correct_option
                ),
            });
        }
    }

    Ok(questions)
}
