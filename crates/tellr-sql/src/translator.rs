//! Natural-language question to candidate SQL.

use std::sync::Arc;

use tellr_config::TranslatorConfig;
use tellr_core::context::{ConversationContext, TurnResolution};
use tellr_core::schema::SchemaDescriptor;
use tellr_llm::{ChatMessage, LanguageModel, Prompt};

use crate::candidate::TranslationCandidate;
use crate::deixis::unresolved_reference;
use crate::error::TranslateError;
use crate::response::{ModelReply, parse_reply};

const INSTRUCTIONS: &str = "\
You are an expert in SQLite. Convert the user's question about the bank's database into one \
valid SQLite SELECT statement.

Rules:
1. If the request is ambiguous and you truly cannot write SQL for it, ask exactly ONE \
clarification question, prefixed with `CLARIFICATION:`.
2. Otherwise make reasonable assumptions and write the best query directly.
3. Only use tables and columns that appear in the schema. Never invent any.
4. Join tables through their foreign keys (for example, join `customers` with `branches` to \
get a customer's city).
5. Never modify data.
6. You may start with one line `CONFIDENCE: <number between 0 and 1>` stating how sure you are.
7. Return only the SQL (or the clarification). No explanations, no markdown.";

/// A request to ask the user something before translating.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClarificationRequest {
    pub question: String,
}

/// What the translator produced for one question.
#[derive(Debug, Clone)]
pub enum Translation {
    Candidate(TranslationCandidate),
    Clarify(ClarificationRequest),
}

/// Wraps a [`LanguageModel`] with the prompt protocol and the policy of
/// asking instead of guessing.
#[derive(Clone)]
pub struct Translator {
    model: Arc<dyn LanguageModel>,
    confidence_threshold: f64,
    default_confidence: f64,
}

impl Translator {
    #[must_use]
    pub fn new(model: Arc<dyn LanguageModel>, config: &TranslatorConfig) -> Self {
        Self {
            model,
            confidence_threshold: config.confidence_threshold,
            default_confidence: config.default_confidence,
        }
    }

    /// Translate `question` using prior turns in `context`.
    ///
    /// # Errors
    ///
    /// Returns `TranslateError::Unavailable` if the model cannot be reached
    /// and `TranslateError::UnparseableSql` if its answer is not SQL.
    pub async fn translate(
        &self,
        question: &str,
        context: &ConversationContext,
        schema: &SchemaDescriptor,
    ) -> Result<Translation, TranslateError> {
        self.translate_with_hint(question, context, schema, None)
            .await
    }

    /// Like [`Self::translate`], telling the model why its previous attempt
    /// was rejected.
    ///
    /// # Errors
    ///
    /// Same as [`Self::translate`].
    pub async fn translate_with_hint(
        &self,
        question: &str,
        context: &ConversationContext,
        schema: &SchemaDescriptor,
        rewrite_hint: Option<&str>,
    ) -> Result<Translation, TranslateError> {
        if let Some(reference) = unresolved_reference(question, context, schema) {
            tracing::debug!(?reference, "unresolved reference, asking instead of translating");
            return Ok(Translation::Clarify(ClarificationRequest {
                question: reference.clarifying_question(),
            }));
        }

        let prompt = build_prompt(question, context, rewrite_hint);
        tracing::debug!(
            model = self.model.name(),
            history = context.len(),
            retry = rewrite_hint.is_some(),
            "translation requested"
        );
        let text = self.model.generate(&prompt, &schema.to_ddl()).await?;

        match parse_reply(&text) {
            ModelReply::Clarification(question) => {
                tracing::debug!("model asked for clarification");
                Ok(Translation::Clarify(ClarificationRequest { question }))
            }
            ModelReply::Sql { sql, confidence } => {
                let confidence = confidence.unwrap_or(self.default_confidence);
                if confidence < self.confidence_threshold {
                    tracing::debug!(confidence, "confidence below threshold");
                    return Ok(Translation::Clarify(ClarificationRequest {
                        question: low_confidence_question(question),
                    }));
                }
                let candidate = TranslationCandidate::parse(sql, confidence)?;
                tracing::debug!(
                    tables = ?candidate.referenced_tables(),
                    aggregate = candidate.is_aggregate(),
                    "translation returned"
                );
                Ok(Translation::Candidate(candidate))
            }
        }
    }
}

fn low_confidence_question(question: &str) -> String {
    format!(
        "I'm not sure how to read \"{}\". Which records, customers or time period do you mean?",
        question.trim()
    )
}

/// History as alternating chat messages, then the question itself.
fn build_prompt(
    question: &str,
    context: &ConversationContext,
    rewrite_hint: Option<&str>,
) -> Prompt {
    let mut messages = Vec::with_capacity(context.len() * 2 + 1);
    for turn in context.turns() {
        messages.push(ChatMessage::user(turn.question.clone()));
        match &turn.resolution {
            TurnResolution::Sql(sql) => messages.push(ChatMessage::assistant(sql.clone())),
            TurnResolution::Clarification(q) => {
                messages.push(ChatMessage::assistant(format!("CLARIFICATION: {q}")));
            }
            TurnResolution::Failed(_) => {}
        }
    }

    let mut last = question.trim().to_string();
    if let Some(hint) = rewrite_hint {
        last.push_str("\n\nYour previous SQL was rejected: ");
        last.push_str(hint);
        last.push_str(". Rewrite it using only tables and columns from the schema.");
    }
    messages.push(ChatMessage::user(last));

    Prompt {
        instructions: INSTRUCTIONS.to_string(),
        messages,
    }
}
