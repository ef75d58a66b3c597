//! Error types for tellr-db.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Failures while running an approved statement. Neither is retried: the
/// same statement against the same data fails the same way.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("query timed out after {} ms", elapsed.as_millis())]
    Timeout { elapsed: Duration },

    /// Storage-layer failure, e.g. a malformed literal or a type mismatch.
    #[error("query failed after {} ms: {message}", elapsed.as_millis())]
    Driver { message: String, elapsed: Duration },
}

impl ExecutionError {
    /// Time spent before the failure.
    #[must_use]
    pub const fn elapsed(&self) -> Duration {
        match self {
            Self::Timeout { elapsed } | Self::Driver { elapsed, .. } => *elapsed,
        }
    }
}

/// Errors opening or initializing the data store.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// `init` refuses to overwrite without `force`.
    #[error("database '{}' already exists (use --force to recreate it)", .0.display())]
    AlreadyExists(PathBuf),

    #[error("database '{}' does not exist", .0.display())]
    NotFound(PathBuf),

    /// Loading the demo schema or data failed.
    #[error("seeding failed: {0}")]
    Seed(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("libSQL error: {0}")]
    LibSql(#[from] libsql::Error),
}
