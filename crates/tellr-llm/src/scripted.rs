//! Deterministic stand-in for a hosted model.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::{LanguageModel, LlmError, Prompt};

struct Rule {
    needle: String,
    responses: Vec<String>,
    hits: usize,
}

/// Canned responses keyed by a case-insensitive substring of the newest
/// user message.
///
/// Rules are tried in insertion order. A rule registered with several
/// responses returns them in turn and then keeps repeating the last one,
/// which lets tests script a rejected first attempt followed by a fix.
pub struct ScriptedModel {
    rules: Mutex<Vec<Rule>>,
    fallback: Option<String>,
    unavailable: bool,
    calls: AtomicUsize,
}

impl Default for ScriptedModel {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedModel {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            rules: Mutex::new(Vec::new()),
            fallback: None,
            unavailable: false,
            calls: AtomicUsize::new(0),
        }
    }

    /// A model that always fails as if the provider were down.
    #[must_use]
    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::new()
        }
    }

    /// Answer `response` whenever the question contains `needle`.
    #[must_use]
    pub fn with_rule(self, needle: impl Into<String>, response: impl Into<String>) -> Self {
        self.with_sequence(needle, [response.into()])
    }

    /// Answer with `responses` in turn whenever the question contains `needle`.
    #[must_use]
    pub fn with_sequence(
        self,
        needle: impl Into<String>,
        responses: impl IntoIterator<Item = String>,
    ) -> Self {
        let rule = Rule {
            needle: needle.into().to_lowercase(),
            responses: responses.into_iter().collect(),
            hits: 0,
        };
        self.rules
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(rule);
        self
    }

    /// Answer used when no rule matches.
    #[must_use]
    pub fn with_fallback(mut self, response: impl Into<String>) -> Self {
        self.fallback = Some(response.into());
        self
    }

    /// Number of `generate` calls so far.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn generate(&self, prompt: &Prompt, _schema_context: &str) -> Result<String, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.unavailable {
            return Err(LlmError::Unavailable("scripted outage".into()));
        }

        let question = prompt.last_user_message().unwrap_or_default().to_lowercase();
        let mut rules = self
            .rules
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(rule) = rules.iter_mut().find(|r| question.contains(&r.needle)) {
            let index = rule.hits.min(rule.responses.len().saturating_sub(1));
            rule.hits += 1;
            if let Some(response) = rule.responses.get(index) {
                return Ok(response.clone());
            }
        }
        self.fallback.clone().ok_or(LlmError::EmptyResponse)
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ChatMessage;

    fn ask(text: &str) -> Prompt {
        Prompt {
            instructions: String::new(),
            messages: vec![ChatMessage::user(text)],
        }
    }

    #[tokio::test]
    async fn matches_rules_case_insensitively() {
        let model = ScriptedModel::new().with_rule("Branches", "SELECT * FROM branches");
        let out = model.generate(&ask("list all BRANCHES"), "").await.unwrap();
        assert_eq!(out, "SELECT * FROM branches");
        assert_eq!(model.calls(), 1);
    }

    #[tokio::test]
    async fn sequence_repeats_last_response() {
        let model = ScriptedModel::new().with_sequence(
            "loans",
            ["SELECT amt FROM loans".to_string(), "SELECT amount FROM loans".to_string()],
        );
        let prompt = ask("total loans");
        assert_eq!(model.generate(&prompt, "").await.unwrap(), "SELECT amt FROM loans");
        assert_eq!(model.generate(&prompt, "").await.unwrap(), "SELECT amount FROM loans");
        assert_eq!(model.generate(&prompt, "").await.unwrap(), "SELECT amount FROM loans");
    }

    #[tokio::test]
    async fn unmatched_without_fallback_is_empty() {
        let model = ScriptedModel::new();
        assert!(matches!(
            model.generate(&ask("anything"), "").await,
            Err(LlmError::EmptyResponse)
        ));
        let model = ScriptedModel::new().with_fallback("CLARIFICATION: Which table?");
        assert_eq!(
            model.generate(&ask("anything"), "").await.unwrap(),
            "CLARIFICATION: Which table?"
        );
    }

    #[tokio::test]
    async fn unavailable_always_fails() {
        let model = ScriptedModel::unavailable();
        assert!(matches!(
            model.generate(&ask("x"), "").await,
            Err(LlmError::Unavailable(_))
        ));
    }
}
