//! Catalog introspection over a libSQL connection.
//!
//! `SQLite` itself is the authority on what a DDL script declares, so both
//! DDL text and live database files are read back through `sqlite_master`
//! and the `table_info` / `foreign_key_list` pragmas.

use tellr_core::schema::{ColumnDef, ForeignKey, SchemaDescriptor, TableDef};

use crate::error::SchemaLoadError;

/// Foreign key as reported by `PRAGMA foreign_key_list`; `to` is NULL when
/// the reference targets the parent's primary key implicitly.
struct RawForeignKey {
    from_table: String,
    from_column: String,
    to_table: String,
    to_column: Option<String>,
}

/// Quote an identifier for use inside a pragma or `FROM` clause.
fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

async fn table_names(conn: &libsql::Connection) -> Result<Vec<String>, SchemaLoadError> {
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

/// Columns in declaration order plus the primary-key column, if single.
async fn table_columns(
    conn: &libsql::Connection,
    table: &str,
) -> Result<(Vec<ColumnDef>, Option<String>), SchemaLoadError> {
    let mut rows = conn
        .query(&format!("PRAGMA table_info({})", quote_ident(table)), ())
        .await?;
    let mut columns = Vec::new();
    let mut pk = Vec::new();
    while let Some(row) = rows.next().await? {
        let name = row.get::<String>(1)?;
        let data_type = row.get::<Option<String>>(2)?.unwrap_or_default();
        let not_null = row.get::<i64>(3)? != 0;
        let pk_index = row.get::<i64>(5)?;
        if pk_index > 0 {
            pk.push(name.clone());
        }
        columns.push(ColumnDef {
            name,
            data_type,
            nullable: !not_null && pk_index == 0,
        });
    }
    let single_pk = if pk.len() == 1 { pk.pop() } else { None };
    Ok((columns, single_pk))
}

async fn table_foreign_keys(
    conn: &libsql::Connection,
    table: &str,
) -> Result<Vec<RawForeignKey>, SchemaLoadError> {
    let mut rows = conn
        .query(
            &format!("PRAGMA foreign_key_list({})", quote_ident(table)),
            (),
        )
        .await?;
    let mut fks = Vec::new();
    while let Some(row) = rows.next().await? {
        fks.push(RawForeignKey {
            from_table: table.to_string(),
            to_table: row.get::<String>(2)?,
            from_column: row.get::<String>(3)?,
            to_column: row.get::<Option<String>>(4)?,
        });
    }
    Ok(fks)
}

async fn row_count(conn: &libsql::Connection, table: &str) -> Result<u64, SchemaLoadError> {
    let mut rows = conn
        .query(&format!("SELECT COUNT(*) FROM {}", quote_ident(table)), ())
        .await?;
    let count = match rows.next().await? {
        Some(row) => row.get::<i64>(0)?,
        None => 0,
    };
    Ok(u64::try_from(count).unwrap_or(0))
}

/// Read the full catalog into a descriptor.
///
/// With `with_counts`, each table's current row count is recorded as its
/// cardinality hint.
pub async fn introspect(
    conn: &libsql::Connection,
    with_counts: bool,
) -> Result<SchemaDescriptor, SchemaLoadError> {
    let names = table_names(conn).await?;
    if names.is_empty() {
        return Err(SchemaLoadError::Malformed("no tables declared".into()));
    }

    let mut tables = Vec::with_capacity(names.len());
    let mut primary_keys = Vec::with_capacity(names.len());
    let mut raw_fks = Vec::new();
    for name in &names {
        let (columns, pk) = table_columns(conn, name).await?;
        let row_estimate = if with_counts {
            Some(row_count(conn, name).await?)
        } else {
            None
        };
        raw_fks.extend(table_foreign_keys(conn, name).await?);
        primary_keys.push((name.clone(), pk));
        tables.push(TableDef {
            name: name.clone(),
            columns,
            row_estimate,
        });
    }

    let mut foreign_keys = Vec::with_capacity(raw_fks.len());
    for fk in raw_fks {
        let to_column = match fk.to_column {
            Some(col) => col,
            None => primary_keys
                .iter()
                .find(|(t, _)| t.eq_ignore_ascii_case(&fk.to_table))
                .and_then(|(_, pk)| pk.clone())
                .ok_or_else(|| {
                    SchemaLoadError::Malformed(format!(
                        "foreign key {}.{} references {} which has no single-column primary key",
                        fk.from_table, fk.from_column, fk.to_table
                    ))
                })?,
        };
        foreign_keys.push(ForeignKey {
            from_table: fk.from_table,
            from_column: fk.from_column,
            to_table: fk.to_table,
            to_column,
        });
    }

    Ok(SchemaDescriptor::new(tables, foreign_keys)?)
}
