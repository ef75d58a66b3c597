//! # tellr-schema
//!
//! Schema registry for tellr.
//!
//! The registry is built once at startup from a [`SchemaSource`] and is
//! read-only afterwards. Cloning is cheap (the descriptor sits behind an
//! `Arc`), so every pipeline invocation can hold its own handle and read
//! concurrently without locking. A process may additionally install one
//! registry as its global instance with [`SchemaRegistry::install`].

mod error;
mod introspect;

use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use libsql::Builder;
use tellr_core::schema::{ColumnRef, ColumnResolution, SchemaDescriptor};

pub use error::SchemaLoadError;

/// Where to read the schema from.
#[derive(Debug, Clone)]
pub enum SchemaSource {
    /// `CREATE TABLE` script text.
    Ddl(String),
    /// Path to a `CREATE TABLE` script.
    DdlFile(PathBuf),
    /// Existing database file; row counts become cardinality hints.
    Database(PathBuf),
}

static GLOBAL: OnceLock<SchemaRegistry> = OnceLock::new();

/// Read-only access to the loaded schema snapshot.
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    descriptor: Arc<SchemaDescriptor>,
}

impl SchemaRegistry {
    /// Load the schema from `source`.
    ///
    /// # Errors
    ///
    /// Returns `SchemaLoadError::Unreachable` if the file cannot be read or
    /// the database does not exist, and `SchemaLoadError::Malformed` if the
    /// DDL does not execute or declares no usable tables.
    pub async fn load(source: &SchemaSource) -> Result<Self, SchemaLoadError> {
        let descriptor = match source {
            SchemaSource::Ddl(ddl) => Self::from_ddl(ddl).await?,
            SchemaSource::DdlFile(path) => {
                let ddl = tokio::fs::read_to_string(path).await.map_err(|e| {
                    SchemaLoadError::Unreachable(format!("{}: {e}", path.display()))
                })?;
                Self::from_ddl(&ddl).await?
            }
            SchemaSource::Database(path) => Self::from_database(path).await?,
        };

        tracing::info!(
            tables = descriptor.table_count(),
            foreign_keys = descriptor.foreign_keys().len(),
            "schema registry loaded"
        );
        Ok(Self::from_descriptor(descriptor))
    }

    /// Wrap an already-built descriptor.
    #[must_use]
    pub fn from_descriptor(descriptor: SchemaDescriptor) -> Self {
        Self {
            descriptor: Arc::new(descriptor),
        }
    }

    async fn from_ddl(ddl: &str) -> Result<SchemaDescriptor, SchemaLoadError> {
        let db = Builder::new_local(":memory:").build().await?;
        let conn = db.connect()?;
        conn.execute_batch(ddl)
            .await
            .map_err(|e| SchemaLoadError::Malformed(format!("DDL failed: {e}")))?;
        introspect::introspect(&conn, false).await
    }

    async fn from_database(path: &Path) -> Result<SchemaDescriptor, SchemaLoadError> {
        // libSQL creates missing files; an absent database is unreachable, not empty.
        if !path.exists() {
            return Err(SchemaLoadError::Unreachable(format!(
                "database '{}' does not exist",
                path.display()
            )));
        }
        let path_str = path.to_string_lossy();
        let db = Builder::new_local(path_str.as_ref())
            .build()
            .await
            .map_err(|e| SchemaLoadError::Unreachable(format!("{}: {e}", path.display())))?;
        let conn = db.connect()?;
        introspect::introspect(&conn, true).await
    }

    /// The cached snapshot.
    #[must_use]
    pub fn describe(&self) -> &SchemaDescriptor {
        &self.descriptor
    }

    /// Shared handle to the snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Arc<SchemaDescriptor> {
        Arc::clone(&self.descriptor)
    }

    /// Case-insensitive lookup of a bare column name across tables.
    ///
    /// Returns `None` when the column is absent or owned by more than one
    /// table; use [`Self::resolve_detailed`] to tell the two apart.
    #[must_use]
    pub fn resolve(&self, identifier: &str) -> Option<ColumnRef> {
        match self.resolve_detailed(identifier) {
            ColumnResolution::Unique(column) => Some(column),
            ColumnResolution::Ambiguous(_) | ColumnResolution::Missing => None,
        }
    }

    /// Resolve a bare column name, reporting ambiguity explicitly.
    #[must_use]
    pub fn resolve_detailed(&self, identifier: &str) -> ColumnResolution {
        let resolution = self.descriptor.resolve_column(identifier);
        if let ColumnResolution::Ambiguous(owners) = &resolution {
            tracing::debug!(identifier, owners = owners.len(), "ambiguous column");
        }
        resolution
    }

    /// Schema rendered as DDL for language-model prompts.
    #[must_use]
    pub fn prompt_context(&self) -> String {
        self.descriptor.to_ddl()
    }

    /// Install this registry as the process-wide instance.
    ///
    /// # Errors
    ///
    /// Returns `SchemaLoadError::AlreadyInstalled` if one was installed before.
    pub fn install(self) -> Result<&'static Self, SchemaLoadError> {
        GLOBAL
            .set(self)
            .map_err(|_| SchemaLoadError::AlreadyInstalled)?;
        GLOBAL.get().ok_or(SchemaLoadError::AlreadyInstalled)
    }

    /// The process-wide instance, if installed.
    #[must_use]
    pub fn global() -> Option<&'static Self> {
        GLOBAL.get()
    }
}
