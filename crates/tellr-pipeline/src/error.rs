//! The caller-facing error taxonomy.

use tellr_core::enums::OutcomeStatus;
use tellr_db::ExecutionError;
use tellr_llm::LlmError;
use tellr_sql::DenyCategory;
use thiserror::Error;

/// Every way one pipeline run can end without an answer or a clarifying
/// question. Clarification is a control-flow branch, not an error.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The language model could not be reached.
    #[error("translation unavailable: {0}")]
    TranslationUnavailable(#[source] LlmError),

    /// The generated SQL named things that do not exist, or was not SQL,
    /// even after one rewrite.
    #[error("could not understand the question: {reason}")]
    CouldNotUnderstand { reason: String },

    /// The safety gate refused the statement.
    #[error("refused: {0}")]
    Refused(DenyCategory),

    #[error(transparent)]
    Execution(#[from] ExecutionError),

    /// Too many clarification rounds for one question.
    #[error("no usable question after {rounds} clarification rounds")]
    ClarificationExhausted { rounds: u32 },
}

impl PipelineError {
    /// Only an unreachable model is worth retrying unchanged.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::TranslationUnavailable(_))
    }

    /// Text for the person who asked. Never includes generated SQL.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::TranslationUnavailable(_) => {
                "The assistant is unavailable right now. Please try again.".to_string()
            }
            Self::CouldNotUnderstand { .. } => {
                "Sorry, I could not understand that question. Try rephrasing it.".to_string()
            }
            Self::Refused(category) => {
                format!("I can't run that request ({category}): {}.", category.description())
            }
            Self::Execution(ExecutionError::Timeout { elapsed }) => format!(
                "The query took too long and was stopped after {} ms.",
                elapsed.as_millis()
            ),
            Self::Execution(ExecutionError::Driver { elapsed, .. }) => {
                format!("The query failed after {} ms.", elapsed.as_millis())
            }
            Self::ClarificationExhausted { rounds } => format!(
                "I still couldn't pin down the question after {rounds} clarifications. \
                 Let's start over."
            ),
        }
    }

    /// Outcome status for reports.
    #[must_use]
    pub const fn status(&self) -> OutcomeStatus {
        match self {
            Self::Refused(_) => OutcomeStatus::Refused,
            _ => OutcomeStatus::Failed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::time::Duration;

    #[rstest]
    #[case::unavailable(
        PipelineError::TranslationUnavailable(LlmError::EmptyResponse),
        true,
        OutcomeStatus::Failed
    )]
    #[case::not_understood(
        PipelineError::CouldNotUnderstand { reason: "x".into() },
        false,
        OutcomeStatus::Failed
    )]
    #[case::refused(
        PipelineError::Refused(DenyCategory::UnboundedResult),
        false,
        OutcomeStatus::Refused
    )]
    #[case::exhausted(
        PipelineError::ClarificationExhausted { rounds: 3 },
        false,
        OutcomeStatus::Failed
    )]
    #[case::timeout(
        PipelineError::Execution(ExecutionError::Timeout { elapsed: Duration::from_secs(5) }),
        false,
        OutcomeStatus::Failed
    )]
    fn classification(
        #[case] err: PipelineError,
        #[case] retryable: bool,
        #[case] status: OutcomeStatus,
    ) {
        assert_eq!(err.is_retryable(), retryable);
        assert_eq!(err.status(), status);
        assert!(!err.user_message().is_empty());
    }

    #[test]
    fn refusal_names_category_only() {
        let message = PipelineError::Refused(DenyCategory::DataModification).user_message();
        assert!(message.contains("data_modification"));
        assert!(!message.to_lowercase().contains("delete from"));
        assert_eq!(
            PipelineError::Refused(DenyCategory::DataModification).status(),
            OutcomeStatus::Refused
        );
    }

    #[test]
    fn execution_failures_report_elapsed_time() {
        let err = PipelineError::from(ExecutionError::Driver {
            message: "no such function: frobnicate".into(),
            elapsed: Duration::from_millis(12),
        });
        assert_eq!(err.user_message(), "The query failed after 12 ms.");
        assert_eq!(err.status(), OutcomeStatus::Failed);
    }
}
