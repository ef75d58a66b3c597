//! Cross-cutting error types for tellr.
//!
//! Stage-specific errors (e.g., `SchemaLoadError`, `ExecutionError`) are
//! defined in their respective crates. The caller-facing taxonomy lives in
//! `tellr-pipeline` where all stage errors converge.

use thiserror::Error;

/// Errors raised while building core data model values.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Data failed validation (format, constraints).
    #[error("Validation error: {0}")]
    Validation(String),
}
