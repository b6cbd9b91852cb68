//! Chat-completion client used by `.ask`.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::config::AiSettings;

/// Errors that can occur while asking for a completion.
#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("OPENAI_KEY is not configured")]
    MissingApiKey,

    #[error("API returned status {0}")]
    Status(StatusCode),

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

/// Something that can answer a single free-text question.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, CompletionError>;
}

/// A chat message in the request body.
#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

/// OpenAI-compatible `chat/completions` client.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    http: Client,
    settings: AiSettings,
}

impl OpenAiClient {
    /// Builds a client with the configured request timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(settings: AiSettings) -> Result<Self, CompletionError> {
        let http = Client::builder().timeout(settings.timeout).build()?;
        Ok(Self { http, settings })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.settings.base_url)
    }
}

#[async_trait]
impl CompletionBackend for OpenAiClient {
    async fn complete(&self, prompt: &str) -> Result<String, CompletionError> {
        let api_key = self
            .settings
            .api_key
            .as_deref()
            .ok_or(CompletionError::MissingApiKey)?;

        let request = ChatRequest {
            model: &self.settings.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: self.settings.temperature,
        };

        debug!("Requesting completion from {}", self.endpoint());
        let response = self
            .http
            .post(self.endpoint())
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(CompletionError::Status(status));
        }

        let body = response.text().await?;
        extract_answer(&body)
    }
}

/// Pulls `choices[0].message.content` out of a response body.
fn extract_answer(body: &str) -> Result<String, CompletionError> {
    let parsed: ChatResponse = serde_json::from_str(body)
        .map_err(|e| CompletionError::MalformedResponse(e.to_string()))?;

    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| CompletionError::MalformedResponse("no choices in response".to_owned()))
}
