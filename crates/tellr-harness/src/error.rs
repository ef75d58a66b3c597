//! Harness error types.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("cannot read scenarios from {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A line is not a valid scenario object.
    #[error("scenario #{entry} is malformed: {message}")]
    Parse { entry: usize, message: String },

    /// A scenario is missing what its category needs.
    #[error("scenario '{id}' is invalid: {reason}")]
    InvalidScenario { id: String, reason: String },

    #[error("cannot write report to {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("report serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}
