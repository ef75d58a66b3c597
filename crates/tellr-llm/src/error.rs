//! Language-model error types.

use thiserror::Error;

/// Why the language-understanding resource could not produce text.
///
/// Every variant means the resource is unavailable for this request; callers
/// do not branch on the cause beyond logging it.
#[derive(Debug, Error)]
pub enum LlmError {
    /// HTTP transport error (connect, timeout, body decode).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Provider returned a non-success status code.
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code returned by the provider.
        status: u16,
        /// Error message or response body.
        message: String,
    },

    /// The provider returned a 429 Too Many Requests response.
    #[error("rate limited, retry after {retry_after_secs}s")]
    RateLimited {
        /// Seconds to wait before retrying.
        retry_after_secs: u64,
    },

    /// The response carried no completion text.
    #[error("empty completion")]
    EmptyResponse,

    /// No provider is reachable or configured.
    #[error("language model unavailable: {0}")]
    Unavailable(String),
}
