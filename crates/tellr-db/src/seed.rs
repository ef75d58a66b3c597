//! Demo banking database.
//!
//! Schema and data are embedded at compile time and loaded with
//! `execute_batch`, the same way migrations are applied.

use std::path::Path;

use libsql::Builder;

use crate::error::DatabaseError;

/// Tables: branches, customers, employees, accounts, transactions, loans.
pub const BANKING_SCHEMA: &str = include_str!("../data/banking_schema.sql");
pub const BANKING_DATA: &str = include_str!("../data/banking_data.sql");

/// Row count of one seeded table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableCount {
    pub table: String,
    pub rows: u64,
}

/// Create the demo database at `path`.
///
/// # Errors
///
/// Returns `DatabaseError::AlreadyExists` if `path` exists and `force` is
/// false, and `DatabaseError::Seed` if the embedded scripts fail.
pub async fn init_database(path: &Path, force: bool) -> Result<Vec<TableCount>, DatabaseError> {
    if path.exists() {
        if !force {
            return Err(DatabaseError::AlreadyExists(path.to_path_buf()));
        }
        tokio::fs::remove_file(path).await?;
        tracing::info!(path = %path.display(), "removed existing database");
    }

    let db = Builder::new_local(path.to_string_lossy().as_ref())
        .build()
        .await?;
    let conn = db.connect()?;
    conn.execute("PRAGMA foreign_keys = ON", ()).await?;
    conn.execute_batch(BANKING_SCHEMA)
        .await
        .map_err(|e| DatabaseError::Seed(format!("schema: {e}")))?;
    conn.execute_batch(BANKING_DATA)
        .await
        .map_err(|e| DatabaseError::Seed(format!("data: {e}")))?;

    let mut tables = Vec::new();
    let mut rows = conn
        .query(
            "SELECT name FROM sqlite_master \
             WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
            (),
        )
        .await?;
    while let Some(row) = rows.next().await? {
        tables.push(row.get::<String>(0)?);
    }

    let mut counts = Vec::with_capacity(tables.len());
    for table in tables {
        let mut rows = conn
            .query(&format!("SELECT COUNT(*) FROM \"{table}\""), ())
            .await?;
        let count = match rows.next().await? {
            Some(row) => u64::try_from(row.get::<i64>(0)?).unwrap_or(0),
            None => 0,
        };
        counts.push(TableCount { table, rows: count });
    }

    tracing::info!(path = %path.display(), tables = counts.len(), "demo database created");
    Ok(counts)
}
