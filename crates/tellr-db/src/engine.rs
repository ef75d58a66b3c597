//! Execution of approved statements.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use libsql::{Builder, Value};
use tellr_config::ExecutionConfig;
use tellr_core::result::{CellValue, ExecutionResult, ResultRow};
use tellr_sql::ApprovedStatement;

use crate::error::{DatabaseError, ExecutionError};

/// Interval between repeated interrupts once the deadline has passed. An
/// interrupt sent before the statement starts stepping is dropped by SQLite.
const INTERRUPT_RETRY: Duration = Duration::from_millis(10);

/// The only component that reads from the data store.
///
/// Every execution opens its own connection, switched to `query_only`, and
/// drops it on return, whether the statement succeeded, failed or timed out.
/// SQLite steps synchronously, so statements run on the blocking pool and a
/// deadline timer interrupts the connection.
pub struct ExecutionEngine {
    db: libsql::Database,
    path: PathBuf,
    row_cap: usize,
    timeout: Duration,
}

struct Fetched {
    columns: Vec<String>,
    rows: Vec<ResultRow>,
    truncated: bool,
}

impl ExecutionEngine {
    /// Open an existing database file.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::NotFound` if the file is missing and
    /// `DatabaseError::LibSql` if it cannot be opened.
    pub async fn open(
        path: impl AsRef<Path>,
        config: &ExecutionConfig,
    ) -> Result<Self, DatabaseError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(DatabaseError::NotFound(path.to_path_buf()));
        }
        let db = Builder::new_local(path.to_string_lossy().as_ref())
            .build()
            .await?;
        tracing::debug!(
            path = %path.display(),
            row_cap = config.row_cap,
            "execution engine opened"
        );
        Ok(Self {
            db,
            path: path.to_path_buf(),
            row_cap: config.row_cap,
            timeout: Duration::from_millis(config.timeout_ms),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The configured per-statement timeout.
    #[must_use]
    pub const fn default_timeout(&self) -> Duration {
        self.timeout
    }

    /// Run `statement`, keeping at most `row_cap` rows.
    ///
    /// The statement is interrupted once `timeout` elapses; the call returns
    /// shortly after the deadline rather than when the statement would have
    /// finished.
    ///
    /// # Errors
    ///
    /// Returns `ExecutionError::Timeout` when `timeout` elapses and
    /// `ExecutionError::Driver` for storage-layer failures.
    pub async fn execute(
        &self,
        statement: &ApprovedStatement,
        timeout: Duration,
    ) -> Result<ExecutionResult, ExecutionError> {
        let started = Instant::now();
        let conn = self.db.connect().map_err(|e| ExecutionError::Driver {
            message: e.to_string(),
            elapsed: started.elapsed(),
        })?;
        let watchdog = conn.clone();
        let sql = statement.sql().to_string();
        let row_cap = self.row_cap;
        let runtime = tokio::runtime::Handle::current();
        let mut task =
            tokio::task::spawn_blocking(move || runtime.block_on(fetch(&conn, &sql, row_cap)));

        let mut wait = timeout;
        let mut interrupted = false;
        let joined = loop {
            tokio::select! {
                joined = &mut task => break joined,
                () = tokio::time::sleep(wait) => {
                    if let Err(e) = watchdog.interrupt() {
                        tracing::warn!(error = %e, "interrupt failed");
                    }
                    interrupted = true;
                    wait = INTERRUPT_RETRY;
                }
            }
        };
        let elapsed = started.elapsed();

        if interrupted || elapsed > timeout {
            return Err(timed_out(elapsed));
        }
        let fetched = match joined {
            Err(e) => {
                return Err(ExecutionError::Driver {
                    message: format!("execution task failed: {e}"),
                    elapsed,
                });
            }
            Ok(Err(e)) => {
                tracing::warn!(elapsed_ms = elapsed.as_millis(), "statement failed");
                return Err(ExecutionError::Driver {
                    message: e.to_string(),
                    elapsed,
                });
            }
            Ok(Ok(fetched)) => fetched,
        };

        tracing::info!(
            rows = fetched.rows.len(),
            truncated = fetched.truncated,
            elapsed_ms = elapsed.as_millis(),
            "statement executed"
        );
        Ok(ExecutionResult::new(
            fetched.columns,
            fetched.rows,
            elapsed,
            fetched.truncated,
        ))
    }

    /// Names of the user tables, for connectivity checks.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::LibSql` if the catalog cannot be read.
    pub async fn list_tables(&self) -> Result<Vec<String>, DatabaseError> {
        let conn = self.db.connect()?;
        let mut rows = conn
            .query(
                "SELECT name FROM sqlite_master \
                 WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
                (),
            )
            .await?;
        let mut names = Vec::new();
        while let Some(row) = rows.next().await? {
            names.push(row.get::<String>(0)?);
        }
        Ok(names)
    }
}

async fn fetch(
    conn: &libsql::Connection,
    sql: &str,
    row_cap: usize,
) -> Result<Fetched, libsql::Error> {
    conn.execute("PRAGMA query_only = 1", ()).await?;

    let mut rows = conn.query(sql, ()).await?;
    let count = rows.column_count();
    let columns = unique_names((0..count).map(|i| rows.column_name(i).unwrap_or("?")));

    let mut kept = Vec::new();
    let mut truncated = false;
    while let Some(row) = rows.next().await? {
        if kept.len() == row_cap {
            truncated = true;
            break;
        }
        let mut record = ResultRow::new();
        for (index, name) in (0..count).zip(&columns) {
            record.insert(name.clone(), cell(row.get_value(index)?));
        }
        kept.push(record);
    }
    Ok(Fetched {
        columns,
        rows: kept,
        truncated,
    })
}

fn timed_out(elapsed: Duration) -> ExecutionError {
    tracing::warn!(elapsed_ms = elapsed.as_millis(), "statement timed out");
    ExecutionError::Timeout { elapsed }
}

fn cell(value: Value) -> CellValue {
    match value {
        Value::Null => CellValue::Null,
        Value::Integer(v) => CellValue::Integer(v),
        Value::Real(v) => CellValue::Real(v),
        Value::Text(v) => CellValue::Text(v),
        Value::Blob(v) => CellValue::Blob(v),
    }
}

/// Rows are keyed by column name, so repeated names get a numeric suffix
/// (`id`, `id_2`).
fn unique_names<'a>(names: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for name in names {
        let mut candidate = name.to_string();
        let mut n = 2;
        while out.contains(&candidate) {
            candidate = format!("{name}_{n}");
            n += 1;
        }
        out.push(candidate);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_column_names_are_suffixed() {
        let names = unique_names(["id", "name", "id", "id"].into_iter());
        assert_eq!(names, ["id", "name", "id_2", "id_3"]);
    }

    #[test]
    fn values_map_to_cells() {
        assert_eq!(cell(Value::Null), CellValue::Null);
        assert_eq!(cell(Value::Integer(7)), CellValue::Integer(7));
        assert_eq!(cell(Value::Text("x".into())), CellValue::Text("x".into()));
        assert_eq!(cell(Value::Blob(vec![1, 2])), CellValue::Blob(vec![1, 2]));
    }
}
