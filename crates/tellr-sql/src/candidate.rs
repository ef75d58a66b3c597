//! Candidate statements produced by the translator.

use sqlparser::ast::Statement;
use sqlparser::dialect::SQLiteDialect;
use sqlparser::parser::Parser;

use crate::error::TranslateError;
use crate::shape::{ColumnUse, StatementShape};

/// A generated statement that has not been validated or executed.
///
/// Holds every statement the text parsed into; only the first is analyzed,
/// the rest exist so the safety gate can refuse stacked statements.
#[derive(Debug, Clone)]
pub struct TranslationCandidate {
    sql: String,
    statements: Vec<Statement>,
    shape: StatementShape,
    confidence: f64,
}

impl TranslationCandidate {
    /// Parse `sql` with the `SQLite` dialect and analyze its shape.
    ///
    /// # Errors
    ///
    /// Returns `TranslateError::UnparseableSql` when the text does not parse
    /// or contains no statement.
    pub fn parse(sql: impl Into<String>, confidence: f64) -> Result<Self, TranslateError> {
        let sql = sql.into();
        let statements = Parser::parse_sql(&SQLiteDialect {}, &sql).map_err(|e| {
            TranslateError::UnparseableSql {
                sql: sql.clone(),
                message: e.to_string(),
            }
        })?;
        let Some(first) = statements.first() else {
            return Err(TranslateError::UnparseableSql {
                sql,
                message: "no statement found".into(),
            });
        };
        let shape = StatementShape::of(first);
        Ok(Self {
            sql,
            statements,
            shape,
            confidence: confidence.clamp(0.0, 1.0),
        })
    }

    /// The statement text as generated.
    #[must_use]
    pub fn raw_sql(&self) -> &str {
        &self.sql
    }

    #[must_use]
    pub fn statements(&self) -> &[Statement] {
        &self.statements
    }

    #[must_use]
    pub const fn shape(&self) -> &StatementShape {
        &self.shape
    }

    /// Distinct tables the statement reads or writes.
    #[must_use]
    pub fn referenced_tables(&self) -> Vec<&str> {
        self.shape.table_names()
    }

    pub fn referenced_columns(&self) -> impl Iterator<Item = &ColumnUse> {
        self.shape.columns.iter().map(|c| &c.column)
    }

    #[must_use]
    pub fn is_aggregate(&self) -> bool {
        self.shape.is_aggregate()
    }

    #[must_use]
    pub const fn confidence(&self) -> f64 {
        self.confidence
    }
}
