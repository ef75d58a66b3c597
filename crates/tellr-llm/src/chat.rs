//! OpenAI-compatible chat-completions client.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tellr_config::LlmConfig;

use crate::{ChatMessage, LanguageModel, LlmError, Prompt, http::check_response};

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: Vec<ChatMessage>,
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Pull the first non-blank completion out of a response body.
fn first_completion(resp: CompletionResponse) -> Result<String, LlmError> {
    resp.choices
        .into_iter()
        .find_map(|c| c.message.content)
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
        .ok_or(LlmError::EmptyResponse)
}

/// HTTP client for a chat-completions endpoint (Groq, `OpenAI`, local servers).
pub struct ChatCompletionsClient {
    http: reqwest::Client,
    url: String,
    api_key: String,
    model: String,
    temperature: f32,
}

impl ChatCompletionsClient {
    /// Create a client from provider configuration.
    ///
    /// # Panics
    ///
    /// Panics if the underlying `reqwest::Client` fails to build.
    #[must_use]
    pub fn new(config: &LlmConfig) -> Self {
        Self {
            http: reqwest::Client::builder()
                .user_agent("tellr/0.1")
                .timeout(Duration::from_secs(config.timeout_secs))
                .build()
                .expect("reqwest client should build"),
            url: config.completions_url(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            temperature: config.temperature,
        }
    }
}

#[async_trait]
impl LanguageModel for ChatCompletionsClient {
    async fn generate(&self, prompt: &Prompt, schema_context: &str) -> Result<String, LlmError> {
        if self.api_key.is_empty() {
            return Err(LlmError::Unavailable("no API key configured".into()));
        }
        let body = CompletionRequest {
            model: &self.model,
            temperature: self.temperature,
            messages: prompt.to_messages(schema_context),
        };
        tracing::debug!(
            model = %self.model,
            messages = body.messages.len(),
            "requesting completion"
        );

        let resp = self
            .http
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;
        let resp = check_response(resp).await?;
        let data: CompletionResponse = resp.json().await?;
        first_completion(data)
    }

    fn name(&self) -> &str {
        &self.model
    }
}
