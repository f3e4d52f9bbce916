use std::thread;
use std::time::Duration;

use reqwest::blocking::Client as HttpClient;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{ConfigError, LlmError, McqError};

pub const DEFAULT_PROMPT_TEMPLATE: &str = "\
Generate {count} unique multiple-choice questions (MCQs) about {topic} at {difficulty} difficulty. \
Each question must have exactly one correct answer and three incorrect options. \
Questions must not involve code or code snippets, must not be answerable by a single web search, and must not repeat. \
Format every question exactly as follows, separating questions with a blank line:

Q1. [Question text]?
a) [Option 1]
b) [Option 2]
c) [Option 3]
d) [Option 4]
Correct answer: [Correct option number]
Difficulty: [Difficulty]
Subject: [Subject Name]
Topic: [Topic Name]
Sub-topic: [Sub-topic Name]
Tags: [Tags]
Blooms Taxonomy: Evaluate
Course Outcome: CO1
Program Outcome: PO1

The options are a, b, c, d; give the correct answer only as the matching number 1, 2, 3 or 4, never as the option text. \
Do not add any other words or symbols to the correct answer line and do not wrap anything in ** markers.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub topic: String,
    pub count: u32,
    pub difficulty: String,
}

#[derive(Debug, Clone)]
pub struct PromptTemplate {
    template: String,
}

impl PromptTemplate {
    pub fn new(template: impl Into<String>) -> Result<Self, ConfigError> {
        let template = template.into();
        for placeholder in ["{topic}", "{count}"] {
            if !template.contains(placeholder) {
                return Err(ConfigError::MissingPlaceholder(placeholder));
            }
        }
        Ok(Self { template })
    }

    pub fn render(&self, request: &GenerationRequest) -> String {
        self.template
            .replace("{topic}", &request.topic)
            .replace("{count}", &request.count.to_string())
            .replace("{difficulty}", &request.difficulty)
    }
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self {
            template: DEFAULT_PROMPT_TEMPLATE.to_string(),
        }
    }
}

pub trait Generator {
    fn generate(&self, request: &GenerationRequest) -> Result<String, LlmError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    Fixed(Duration),
    Linear(Duration),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Backoff,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Backoff) -> Result<Self, ConfigError> {
        if max_attempts == 0 {
            return Err(ConfigError::ZeroAttempts);
        }
        Ok(Self {
            max_attempts,
            backoff,
        })
    }

    // `failed_attempts` counts the attempts made so far (1-based).
    pub fn delay_after(&self, failed_attempts: u32) -> Duration {
        match self.backoff {
            Backoff::Fixed(delay) => delay,
            Backoff::Linear(step) => step.saturating_mul(failed_attempts),
        }
    }
}

pub fn generate_with_retry(
    generator: &dyn Generator,
    request: &GenerationRequest,
    policy: &RetryPolicy,
) -> Result<String, McqError> {
    let mut attempt = 1;
    loop {
        match generator.generate(request) {
            Ok(text) => {
                info!(attempt, bytes = text.len(), "generation succeeded");
                return Ok(text);
            }
            Err(err) if attempt >= policy.max_attempts => {
                warn!(attempt, error = %err, "generation failed, no attempts left");
                return Err(McqError::GenerationFailed {
                    attempts: attempt,
                    source: err,
                });
            }
            Err(err) => {
                let delay = policy.delay_after(attempt);
                warn!(
                    attempt,
                    max_attempts = policy.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "generation attempt failed, retrying"
                );
                thread::sleep(delay);
                attempt += 1;
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct GenerationConfig {
    pub base_url: String,
    pub model: String,
    pub api_key: String,
    pub temperature: f32,
    pub timeout: Duration,
}

// OpenAI-compatible chat completions endpoint.
pub struct LlmClient {
    client: HttpClient,
    config: GenerationConfig,
    template: PromptTemplate,
}

impl LlmClient {
    pub fn new(config: GenerationConfig, template: PromptTemplate) -> Result<Self, LlmError> {
        let endpoint = config.base_url.clone();
        let client = HttpClient::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|source| LlmError::Request { endpoint, source })?;
        Ok(Self {
            client,
            config: GenerationConfig {
                base_url: config.base_url.trim_end_matches('/').to_string(),
                ..config
            },
            template,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.base_url)
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: [ChatMessage<'a>; 1],
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

impl Generator for LlmClient {
    fn generate(&self, request: &GenerationRequest) -> Result<String, LlmError> {
        let endpoint = self.endpoint();
        let prompt = self.template.render(request);
        debug!(model = %self.config.model, endpoint = %endpoint, prompt_bytes = prompt.len(), "calling model");

        let body = ChatRequest {
            model: &self.config.model,
            temperature: self.config.temperature,
            messages: [ChatMessage {
                role: "user",
                content: &prompt,
            }],
        };

        let request_error = |source: reqwest::Error| {
            if source.is_timeout() {
                LlmError::Timeout(self.config.timeout)
            } else {
                LlmError::Request {
                    endpoint: endpoint.clone(),
                    source,
                }
            }
        };

        let response = self
            .client
            .post(&endpoint)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .map_err(request_error)?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<ErrorResponse>()
                .map(|body| body.error.message)
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(LlmError::BadStatus {
                endpoint: endpoint.clone(),
                status: status.as_u16(),
                message,
            });
        }

        let reply: ChatResponse = response.json().map_err(request_error)?;
        reply
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty())
            .ok_or_else(|| LlmError::EmptyContent {
                model: self.config.model.clone(),
            })
    }
}
