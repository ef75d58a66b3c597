//! Schema loading error types.

use thiserror::Error;

/// Errors from building the schema registry. All of them are fatal at
/// startup.
#[derive(Debug, Error)]
pub enum SchemaLoadError {
    /// The schema source could not be read or opened.
    #[error("Schema source unreachable: {0}")]
    Unreachable(String),

    /// The source was read but does not describe a usable schema.
    #[error("Schema is malformed: {0}")]
    Malformed(String),

    /// A registry was already installed for this process.
    #[error("Schema registry is already installed")]
    AlreadyInstalled,

    /// Underlying libSQL error during introspection.
    #[error("libSQL error: {0}")]
    LibSql(#[from] libsql::Error),
}

impl From<tellr_core::errors::CoreError> for SchemaLoadError {
    fn from(e: tellr_core::errors::CoreError) -> Self {
        Self::Malformed(e.to_string())
    }
}
