//! Immutable relational schema snapshot.
//!
//! A `SchemaDescriptor` is built once (by the schema registry) and only read
//! afterwards. All name lookups are ASCII case-insensitive, matching `SQLite`
//! identifier semantics.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::errors::CoreError;

/// One declared column of a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    /// Declared type as written in the DDL (may be empty in `SQLite`).
    pub data_type: String,
    pub nullable: bool,
}

impl ColumnDef {
    #[must_use]
    pub fn affinity(&self) -> Affinity {
        Affinity::of(&self.data_type)
    }
}

/// One table with its columns in declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDef {
    pub name: String,
    pub columns: Vec<ColumnDef>,
    /// Row-count hint used for join fan-out estimates, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row_estimate: Option<u64>,
}

impl TableDef {
    /// Case-insensitive column lookup.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }
}

/// A declared foreign-key edge `from_table.from_column -> to_table.to_column`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKey {
    pub from_table: String,
    pub from_column: String,
    pub to_table: String,
    pub to_column: String,
}

impl ForeignKey {
    /// Whether this edge connects the two columns, in either direction.
    #[must_use]
    pub fn connects(&self, a: (&str, &str), b: (&str, &str)) -> bool {
        let forward = self.from_table.eq_ignore_ascii_case(a.0)
            && self.from_column.eq_ignore_ascii_case(a.1)
            && self.to_table.eq_ignore_ascii_case(b.0)
            && self.to_column.eq_ignore_ascii_case(b.1);
        let backward = self.from_table.eq_ignore_ascii_case(b.0)
            && self.from_column.eq_ignore_ascii_case(b.1)
            && self.to_table.eq_ignore_ascii_case(a.0)
            && self.to_column.eq_ignore_ascii_case(a.1);
        forward || backward
    }
}

/// A column together with its owning table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColumnRef {
    pub table: String,
    pub column: String,
    pub data_type: String,
}

/// Outcome of resolving a bare column name across all tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnResolution {
    /// Exactly one table owns the column.
    Unique(ColumnRef),
    /// More than one table owns a column with this name.
    Ambiguous(Vec<ColumnRef>),
    /// No table owns the column.
    Missing,
}

/// `SQLite` type affinity, derived from a declared type with the documented
/// substring rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Affinity {
    Integer,
    Text,
    Blob,
    Real,
    Numeric,
}

impl Affinity {
    #[must_use]
    pub fn of(declared: &str) -> Self {
        let upper = declared.to_ascii_uppercase();
        if upper.contains("INT") {
            Self::Integer
        } else if upper.contains("CHAR") || upper.contains("CLOB") || upper.contains("TEXT") {
            Self::Text
        } else if upper.is_empty() || upper.contains("BLOB") {
            Self::Blob
        } else if upper.contains("REAL") || upper.contains("FLOA") || upper.contains("DOUB") {
            Self::Real
        } else {
            Self::Numeric
        }
    }

    /// Whether an equality between values of these affinities is meaningful.
    ///
    /// Numeric affinities compare with each other; `Blob` (untyped) compares
    /// with anything.
    #[must_use]
    pub const fn comparable_with(self, other: Self) -> bool {
        match (self, other) {
            (Self::Blob, _) | (_, Self::Blob) => true,
            (Self::Text, Self::Text) => true,
            (Self::Text, _) | (_, Self::Text) => false,
            _ => true,
        }
    }
}

/// Immutable snapshot of tables, columns and foreign keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaDescriptor {
    /// Keyed by lower-cased table name.
    tables: BTreeMap<String, TableDef>,
    foreign_keys: Vec<ForeignKey>,
}

impl SchemaDescriptor {
    /// Build a descriptor, rejecting structurally malformed input.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Validation` if there are no tables, a table has no
    /// columns, a table name repeats, or a foreign key names an unknown
    /// table or column.
    pub fn new(tables: Vec<TableDef>, foreign_keys: Vec<ForeignKey>) -> Result<Self, CoreError> {
        if tables.is_empty() {
            return Err(CoreError::Validation("schema has no tables".into()));
        }

        let mut map = BTreeMap::new();
        for table in tables {
            if table.columns.is_empty() {
                return Err(CoreError::Validation(format!(
                    "table '{}' has zero columns",
                    table.name
                )));
            }
            let key = table.name.to_ascii_lowercase();
            if map.contains_key(&key) {
                return Err(CoreError::Validation(format!(
                    "table '{}' is declared twice",
                    table.name
                )));
            }
            map.insert(key, table);
        }

        let descriptor = Self {
            tables: map,
            foreign_keys,
        };
        for fk in &descriptor.foreign_keys {
            if descriptor.column(&fk.from_table, &fk.from_column).is_none()
                || descriptor.column(&fk.to_table, &fk.to_column).is_none()
            {
                return Err(CoreError::Validation(format!(
                    "foreign key {}.{} -> {}.{} references an unknown column",
                    fk.from_table, fk.from_column, fk.to_table, fk.to_column
                )));
            }
        }
        Ok(descriptor)
    }

    /// Tables in name order.
    pub fn tables(&self) -> impl Iterator<Item = &TableDef> {
        self.tables.values()
    }

    #[must_use]
    pub fn table_count(&self) -> usize {
        self.tables.len()
    }

    #[must_use]
    pub fn foreign_keys(&self) -> &[ForeignKey] {
        &self.foreign_keys
    }

    /// Case-insensitive table lookup.
    #[must_use]
    pub fn table(&self, name: &str) -> Option<&TableDef> {
        self.tables.get(&name.to_ascii_lowercase())
    }

    /// Case-insensitive lookup of `table.column`.
    #[must_use]
    pub fn column(&self, table: &str, column: &str) -> Option<&ColumnDef> {
        self.table(table)?.column(column)
    }

    /// Resolve a bare column name across every table.
    #[must_use]
    pub fn resolve_column(&self, name: &str) -> ColumnResolution {
        self.resolve_column_in(name, self.tables.values())
    }

    /// Resolve a bare column name across a subset of tables (e.g. the
    /// tables named in one statement).
    #[must_use]
    pub fn resolve_column_in<'a>(
        &self,
        name: &str,
        tables: impl IntoIterator<Item = &'a TableDef>,
    ) -> ColumnResolution {
        let mut owners: Vec<ColumnRef> = tables
            .into_iter()
            .filter_map(|t| {
                t.column(name).map(|c| ColumnRef {
                    table: t.name.clone(),
                    column: c.name.clone(),
                    data_type: c.data_type.clone(),
                })
            })
            .collect();

        match owners.len() {
            0 => ColumnResolution::Missing,
            1 => ColumnResolution::Unique(owners.remove(0)),
            _ => ColumnResolution::Ambiguous(owners),
        }
    }

    /// Whether a declared foreign key joins the two columns.
    #[must_use]
    pub fn has_foreign_key(&self, a: (&str, &str), b: (&str, &str)) -> bool {
        self.foreign_keys.iter().any(|fk| fk.connects(a, b))
    }

    /// Whether any table declares a column with this name.
    #[must_use]
    pub fn has_column_named(&self, name: &str) -> bool {
        self.tables.values().any(|t| t.column(name).is_some())
    }

    /// Render as `CREATE TABLE` text for language-model prompts.
    #[must_use]
    pub fn to_ddl(&self) -> String {
        let mut out = String::new();
        for table in self.tables.values() {
            let _ = writeln!(out, "CREATE TABLE {} (", table.name);
            let fks: Vec<&ForeignKey> = self
                .foreign_keys
                .iter()
                .filter(|fk| fk.from_table.eq_ignore_ascii_case(&table.name))
                .collect();
            let mut lines: Vec<String> = table
                .columns
                .iter()
                .map(|c| {
                    let null = if c.nullable { "" } else { " NOT NULL" };
                    format!("    {} {}{null}", c.name, c.data_type)
                })
                .collect();
            lines.extend(fks.iter().map(|fk| {
                format!(
                    "    FOREIGN KEY ({}) REFERENCES {}({})",
                    fk.from_column, fk.to_table, fk.to_column
                )
            }));
            let _ = writeln!(out, "{}", lines.join(",\n"));
            let _ = writeln!(out, ");");
        }
        out
    }
}
