//! Question in, answer or clarifying question out.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tellr_config::TellrConfig;
use tellr_core::context::ConversationContext;
use tellr_core::result::ExecutionResult;
use tellr_core::schema::SchemaDescriptor;
use tellr_db::ExecutionEngine;
use tellr_llm::LanguageModel;
use tellr_sql::{
    GateDecision, SafetyGate, TranslateError, Translation, Translator, ValidatedCandidate,
    Verdict, validate,
};

use crate::error::PipelineError;
use crate::explain::explain;
use crate::sessions::SessionStore;

/// An executed answer.
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    /// The statement that ran, including any appended bound.
    pub sql: String,
    /// The statement as the model wrote it.
    pub candidate_sql: String,
    pub result: ExecutionResult,
    pub explanation: String,
}

/// What one question produced.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Outcome {
    Answered(Answer),
    Clarify { question: String },
}

/// Result of one translate-validate-execute pass, before session
/// bookkeeping.
enum Step {
    Answered(Answer),
    Clarify {
        question: String,
        partial_sql: Option<String>,
    },
}

/// The orchestrator. Shared by every session; per-session state lives in
/// the [`SessionStore`].
pub struct Pipeline {
    translator: Translator,
    schema: Arc<SchemaDescriptor>,
    gate: SafetyGate,
    engine: ExecutionEngine,
    sessions: SessionStore,
    timeout: Duration,
}

impl Pipeline {
    #[must_use]
    pub fn new(
        model: Arc<dyn LanguageModel>,
        schema: Arc<SchemaDescriptor>,
        engine: ExecutionEngine,
        config: &TellrConfig,
    ) -> Self {
        Self {
            translator: Translator::new(model, &config.translator),
            gate: SafetyGate::new(config.safety.clone(), Arc::clone(&schema)),
            schema,
            timeout: engine.default_timeout(),
            engine,
            sessions: SessionStore::new(config.clarification.clone()),
        }
    }

    #[must_use]
    pub const fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    #[must_use]
    pub const fn engine(&self) -> &ExecutionEngine {
        &self.engine
    }

    /// Answer `input` within `session_id`, or ask a clarifying question.
    ///
    /// When the session is waiting on a clarification, `input` is taken as
    /// the answer and merged with the pending question.
    ///
    /// # Errors
    ///
    /// Returns a [`PipelineError`] for every outcome that is neither an
    /// answer nor a clarification. The session stays usable afterwards.
    pub async fn ask(&self, session_id: &str, input: &str) -> Result<Outcome, PipelineError> {
        let session = self.sessions.get_or_create(session_id);
        let mut manager = session.lock().await;
        let question = manager.effective_question(input);
        tracing::info!(session_id, merged = manager.is_awaiting(), "question received");

        match self.run(&question, manager.context()).await {
            Ok(Step::Answered(answer)) => {
                manager.record_answer(&question, &answer.sql);
                Ok(Outcome::Answered(answer))
            }
            Ok(Step::Clarify {
                question: asked,
                partial_sql,
            }) => {
                manager.record_clarification(&question, &asked, partial_sql)?;
                Ok(Outcome::Clarify { question: asked })
            }
            Err(err) => {
                tracing::warn!(session_id, error = %err, "question failed");
                manager.record_failure(&question, &err.user_message());
                Err(err)
            }
        }
    }

    /// Forget a session's conversation and pending clarification.
    pub async fn reset_session(&self, session_id: &str) {
        self.sessions.get_or_create(session_id).lock().await.reset();
    }

    async fn run(
        &self,
        question: &str,
        context: &ConversationContext,
    ) -> Result<Step, PipelineError> {
        let mut hint: Option<String> = None;
        loop {
            let retried = hint.is_some();
            let translation = self
                .translator
                .translate_with_hint(question, context, &self.schema, hint.as_deref())
                .await;

            let candidate = match translation {
                Ok(Translation::Candidate(candidate)) => candidate,
                Ok(Translation::Clarify(request)) => {
                    return Ok(Step::Clarify {
                        question: request.question,
                        partial_sql: None,
                    });
                }
                Err(TranslateError::Unavailable(e)) => {
                    return Err(PipelineError::TranslationUnavailable(e));
                }
                Err(TranslateError::UnparseableSql { message, .. }) => {
                    let reason = format!("the answer was not valid SQLite ({message})");
                    if retried {
                        return Err(PipelineError::CouldNotUnderstand { reason });
                    }
                    tracing::debug!("unparseable SQL, retrying with a hint");
                    hint = Some(reason);
                    continue;
                }
            };

            let candidate_sql = candidate.raw_sql().to_string();
            match validate(candidate, &self.schema) {
                Verdict::Valid(valid) => return self.gate_and_execute(valid, candidate_sql).await,
                Verdict::Ambiguous { question, .. } => {
                    return Ok(Step::Clarify {
                        question,
                        partial_sql: Some(candidate_sql),
                    });
                }
                Verdict::SchemaMismatch { reason, identifier } => {
                    tracing::warn!(%identifier, retried, "schema mismatch");
                    if retried {
                        return Err(PipelineError::CouldNotUnderstand { reason });
                    }
                    hint = Some(reason);
                }
            }
        }
    }

    async fn gate_and_execute(
        &self,
        valid: ValidatedCandidate,
        candidate_sql: String,
    ) -> Result<Step, PipelineError> {
        let approved = match self.gate.check(valid) {
            GateDecision::Allow(approved) => approved,
            GateDecision::Deny(category) => return Err(PipelineError::Refused(category)),
        };
        let result = self.engine.execute(&approved, self.timeout).await?;
        let explanation = explain(approved.shape(), &result, approved.appended_limit());
        Ok(Step::Answered(Answer {
            sql: approved.sql().to_string(),
            candidate_sql,
            result,
            explanation,
        }))
    }
}
