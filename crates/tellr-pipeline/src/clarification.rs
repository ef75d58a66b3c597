//! Per-session clarification state machine.
//!
//! ```text
//!            question                         clarifying question
//!   Idle ───────────────► run pipeline ──────────────────────────► AwaitingClarification
//!    ▲                        │                                        │
//!    │   answer / failure     │                                        │ answer: merged with
//!    └────────────────────────┘◄───────────────────────────────────────┘ the pending question
//! ```
//!
//! More than `max_rounds` consecutive clarifying questions for one
//! question ends the turn with `ClarificationExhausted` and resets to
//! `Idle`.

use tellr_core::context::{ConversationContext, TurnResolution};

use crate::error::PipelineError;

/// Where a session stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClarificationState {
    Idle,
    AwaitingClarification {
        /// The question (already merged with earlier answers) that led to
        /// the clarification.
        pending_question: String,
        /// What the user was asked.
        asked: String,
        /// SQL drafted before the clarification, if any.
        partial_sql: Option<String>,
        /// Clarifying questions asked so far for this question.
        rounds: u32,
    },
}

impl ClarificationState {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::AwaitingClarification { .. } => "awaiting_clarification",
        }
    }
}

/// Clarification state plus the conversation it belongs to.
#[derive(Debug, Clone)]
pub struct ClarificationManager {
    state: ClarificationState,
    context: ConversationContext,
    max_rounds: u32,
}

impl ClarificationManager {
    #[must_use]
    pub fn new(max_rounds: u32, context_window: usize) -> Self {
        Self {
            state: ClarificationState::Idle,
            context: ConversationContext::new(context_window),
            max_rounds,
        }
    }

    #[must_use]
    pub const fn state(&self) -> &ClarificationState {
        &self.state
    }

    #[must_use]
    pub const fn context(&self) -> &ConversationContext {
        &self.context
    }

    #[must_use]
    pub const fn is_awaiting(&self) -> bool {
        matches!(self.state, ClarificationState::AwaitingClarification { .. })
    }

    /// The question to translate for `input`: the input itself when idle,
    /// or the pending question followed by the input when it answers a
    /// clarification.
    #[must_use]
    pub fn effective_question(&self, input: &str) -> String {
        let input = input.trim();
        match &self.state {
            ClarificationState::Idle => input.to_string(),
            ClarificationState::AwaitingClarification {
                pending_question, ..
            } => format!("{pending_question} {input}"),
        }
    }

    /// The pipeline asked `asked` while working on `question`.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::ClarificationExhausted` once more than
    /// `max_rounds` questions have been asked; the session is then back to
    /// `Idle`.
    pub fn record_clarification(
        &mut self,
        question: &str,
        asked: &str,
        partial_sql: Option<String>,
    ) -> Result<(), PipelineError> {
        let rounds = match &self.state {
            ClarificationState::Idle => 1,
            ClarificationState::AwaitingClarification { rounds, .. } => rounds + 1,
        };
        if rounds > self.max_rounds {
            let err = PipelineError::ClarificationExhausted {
                rounds: self.max_rounds,
            };
            self.record_failure(question, &err.user_message());
            return Err(err);
        }

        self.context
            .push(question, TurnResolution::Clarification(asked.to_string()));
        self.transition(ClarificationState::AwaitingClarification {
            pending_question: question.to_string(),
            asked: asked.to_string(),
            partial_sql,
            rounds,
        });
        Ok(())
    }

    /// `question` was answered by executing `sql`.
    pub fn record_answer(&mut self, question: &str, sql: &str) {
        self.context
            .push(question, TurnResolution::Sql(sql.to_string()));
        self.transition(ClarificationState::Idle);
    }

    /// `question` ended in an error.
    pub fn record_failure(&mut self, question: &str, message: &str) {
        self.context
            .push(question, TurnResolution::Failed(message.to_string()));
        self.transition(ClarificationState::Idle);
    }

    /// Forget the conversation entirely.
    pub fn reset(&mut self) {
        self.context = ConversationContext::new(self.context.capacity());
        self.transition(ClarificationState::Idle);
    }

    fn transition(&mut self, next: ClarificationState) {
        if self.state.name() != next.name() {
            tracing::debug!(from = self.state.name(), to = next.name(), "clarification state");
        }
        self.state = next;
    }
}
