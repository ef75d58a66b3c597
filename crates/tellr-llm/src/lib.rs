//! # tellr-llm
//!
//! The language-understanding capability used by the query translator.
//!
//! [`LanguageModel`] is the only seam: the translator builds a [`Prompt`]
//! and receives raw text back. Two implementations ship here:
//!
//! - [`ChatCompletionsClient`]: any OpenAI-compatible chat-completions
//!   endpoint (Groq by default).
//! - [`ScriptedModel`]: deterministic canned responses for tests and the
//!   scenario harness.

mod chat;
mod error;
mod http;
mod scripted;

pub use chat::ChatCompletionsClient;
pub use error::LlmError;
pub use scripted::ScriptedModel;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Speaker of one chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One message of a chat transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Instructions plus the user/assistant transcript, newest message last.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Prompt {
    pub instructions: String,
    pub messages: Vec<ChatMessage>,
}

impl Prompt {
    /// The newest user message, which carries the question being asked.
    #[must_use]
    pub fn last_user_message(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
    }

    /// Full transcript including the system message with the schema appended.
    #[must_use]
    pub fn to_messages(&self, schema_context: &str) -> Vec<ChatMessage> {
        let mut system = self.instructions.clone();
        if !schema_context.is_empty() {
            system.push_str("\n\nSchema:\n```sql\n");
            system.push_str(schema_context.trim_end());
            system.push_str("\n```");
        }
        let mut out = Vec::with_capacity(self.messages.len() + 1);
        out.push(ChatMessage {
            role: Role::System,
            content: system,
        });
        out.extend(self.messages.iter().cloned());
        out
    }
}

/// Natural-language-to-SQL text generation.
///
/// Implementations must be safe to share across concurrent sessions.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Generate a completion for `prompt`, with `schema_context` embedded
    /// in the system instructions.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError`] when the resource is unreachable or answers
    /// with nothing usable.
    async fn generate(&self, prompt: &Prompt, schema_context: &str) -> Result<String, LlmError>;

    /// Short identifier for logs.
    fn name(&self) -> &str;
}
