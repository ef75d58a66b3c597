//! Translation error types.

use tellr_llm::LlmError;
use thiserror::Error;

/// Failures of the query translator that are not clarification requests.
#[derive(Debug, Error)]
pub enum TranslateError {
    /// The language-understanding resource could not be reached.
    #[error("translation unavailable: {0}")]
    Unavailable(#[from] LlmError),

    /// The model answered with text that does not parse as SQL.
    #[error("model output is not valid SQL: {message}")]
    UnparseableSql {
        /// The extracted statement text.
        sql: String,
        /// Parser diagnostic.
        message: String,
    },
}
