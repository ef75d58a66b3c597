//! The read-only safety gate.
//!
//! The gate is the last stop before execution and the only producer of
//! [`ApprovedStatement`], the sole input the execution engine accepts.
//! Read-only enforcement has no configuration switch; only the row and
//! fan-out ceilings are tunable.

use std::fmt;
use std::sync::Arc;

use sqlparser::ast::{Expr, LimitClause, Statement, Value, ValueWithSpan};
use sqlparser::dialect::SQLiteDialect;
use sqlparser::tokenizer::{Span, Token, Tokenizer};
use tellr_config::SafetyConfig;
use tellr_core::schema::SchemaDescriptor;

use crate::shape::{LimitBound, StatementKind, StatementShape};
use crate::validator::ValidatedCandidate;

/// Verbs that change data or schema anywhere in a statement. `REPLACE`
/// is absent because it is also a string function.
const MODIFYING_VERBS: [&str; 15] = [
    "INSERT", "UPDATE", "DELETE", "DROP", "ALTER", "CREATE", "TRUNCATE", "ATTACH", "DETACH",
    "PRAGMA", "VACUUM", "REINDEX", "GRANT", "REVOKE", "MERGE",
];

/// Why a statement was refused. Shown to users in place of the SQL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DenyCategory {
    DataModification,
    MultipleStatements,
    NotAQuery,
    UnboundedResult,
    ExcessiveFanOut,
}

impl DenyCategory {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DataModification => "data_modification",
            Self::MultipleStatements => "multiple_statements",
            Self::NotAQuery => "not_a_query",
            Self::UnboundedResult => "unbounded_result",
            Self::ExcessiveFanOut => "excessive_fan_out",
        }
    }

    /// User-facing description.
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::DataModification => "the request would modify data, and access is read-only",
            Self::MultipleStatements => "the request produced more than one statement",
            Self::NotAQuery => "only read queries can be run",
            Self::UnboundedResult => "the request asks for more rows than allowed",
            Self::ExcessiveFanOut => "the request would combine too many rows across tables",
        }
    }
}

impl fmt::Display for DenyCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A statement cleared for execution.
///
/// No public constructor: holding one proves the statement passed the
/// validator and the gate.
#[derive(Debug, Clone)]
pub struct ApprovedStatement {
    sql: String,
    shape: StatementShape,
    appended_limit: Option<u64>,
}

impl ApprovedStatement {
    /// The exact text to execute.
    #[must_use]
    pub fn sql(&self) -> &str {
        &self.sql
    }

    #[must_use]
    pub const fn shape(&self) -> &StatementShape {
        &self.shape
    }

    /// The bound the gate added, if the statement had none.
    #[must_use]
    pub const fn appended_limit(&self) -> Option<u64> {
        self.appended_limit
    }
}

/// Outcome of [`SafetyGate::check`].
#[derive(Debug, Clone)]
pub enum GateDecision {
    Allow(ApprovedStatement),
    Deny(DenyCategory),
}

/// Read-only, bounded-result enforcement.
#[derive(Debug, Clone)]
pub struct SafetyGate {
    config: SafetyConfig,
    schema: Arc<SchemaDescriptor>,
}

impl SafetyGate {
    /// `schema` supplies the cardinality hints for fan-out estimates.
    #[must_use]
    pub const fn new(config: SafetyConfig, schema: Arc<SchemaDescriptor>) -> Self {
        Self { config, schema }
    }

    /// Allow or deny a validated candidate.
    #[must_use]
    pub fn check(&self, validated: ValidatedCandidate) -> GateDecision {
        let decision = self.decide(validated);
        match &decision {
            GateDecision::Allow(approved) => tracing::debug!(
                appended_limit = ?approved.appended_limit,
                "statement allowed"
            ),
            GateDecision::Deny(category) => tracing::warn!(%category, "statement denied"),
        }
        decision
    }

    fn decide(&self, validated: ValidatedCandidate) -> GateDecision {
        let candidate = validated.into_candidate();

        if contains_modifying_verb(candidate.raw_sql()) {
            return GateDecision::Deny(DenyCategory::DataModification);
        }
        if candidate.statements().len() != 1 {
            return GateDecision::Deny(DenyCategory::MultipleStatements);
        }
        let shape = candidate.shape();
        if shape.kind != StatementKind::Query {
            return GateDecision::Deny(DenyCategory::NotAQuery);
        }

        let appended_limit = match shape.limit {
            LimitBound::Literal(n) if n > self.config.max_limit => {
                return GateDecision::Deny(DenyCategory::UnboundedResult);
            }
            LimitBound::NonLiteral => return GateDecision::Deny(DenyCategory::UnboundedResult),
            LimitBound::Absent if !shape.is_single_row_aggregate() => {
                Some(self.config.default_limit)
            }
            LimitBound::Literal(_) | LimitBound::Absent => None,
        };

        if let Some(estimate) = self.fan_out(shape)
            && estimate > self.config.max_fan_out
        {
            tracing::debug!(estimate, ceiling = self.config.max_fan_out, "fan-out too large");
            return GateDecision::Deny(DenyCategory::ExcessiveFanOut);
        }

        let sql = match (appended_limit, candidate.statements().first()) {
            (Some(limit), Some(statement)) => with_limit(statement, limit),
            _ => candidate.raw_sql().trim().to_string(),
        };
        GateDecision::Allow(ApprovedStatement {
            sql,
            shape: shape.clone(),
            appended_limit,
        })
    }

    /// Largest product of row-count hints over the tables one scope joins,
    /// or `None` when nothing is joined or any hint is missing.
    fn fan_out(&self, shape: &StatementShape) -> Option<u64> {
        let mut worst = None;
        for group in shape.join_groups() {
            let product = group.iter().try_fold(1_u64, |acc, table| {
                let rows = self.schema.table(&table.name)?.row_estimate?;
                Some(acc.saturating_mul(rows.max(1)))
            })?;
            worst = worst.max(Some(product));
        }
        worst
    }
}

/// Scan word tokens, so verbs inside string literals and quoted
/// identifiers do not count.
fn contains_modifying_verb(sql: &str) -> bool {
    let Ok(tokens) = Tokenizer::new(&SQLiteDialect {}, sql).tokenize() else {
        return true;
    };
    tokens.iter().any(|token| match token {
        Token::Word(word) if word.quote_style.is_none() => {
            let upper = word.value.to_ascii_uppercase();
            MODIFYING_VERBS.contains(&upper.as_str())
        }
        _ => false,
    })
}

/// Render `statement` with a row bound added.
fn with_limit(statement: &Statement, limit: u64) -> String {
    let mut statement = statement.clone();
    if let Statement::Query(query) = &mut statement {
        let bound = Expr::Value(ValueWithSpan {
            value: Value::Number(limit.to_string(), false),
            span: Span::empty(),
        });
        match &mut query.limit_clause {
            Some(LimitClause::LimitOffset { limit, .. }) => *limit = Some(bound),
            _ => {
                query.limit_clause = Some(LimitClause::LimitOffset {
                    limit: Some(bound),
                    offset: None,
                    limit_by: Vec::new(),
                });
            }
        }
    }
    statement.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidate::TranslationCandidate;
    use crate::validator::{Verdict, validate};
    use rstest::rstest;
    use tellr_core::schema::{ColumnDef, ForeignKey, TableDef};

    fn table(name: &str, columns: &[&str], rows: Option<u64>) -> TableDef {
        TableDef {
            name: name.into(),
            columns: columns
                .iter()
                .map(|c| ColumnDef {
                    name: (*c).into(),
                    data_type: "INTEGER".into(),
                    nullable: true,
                })
                .collect(),
            row_estimate: rows,
        }
    }

    fn schema(rows: Option<u64>) -> Arc<SchemaDescriptor> {
        Arc::new(
            SchemaDescriptor::new(
                vec![
                    table("customers", &["id", "branch_id"], rows),
                    table("accounts", &["id", "customer_id", "balance"], rows),
                    table("transactions", &["id", "account_id", "amount"], rows),
                ],
                vec![ForeignKey {
                    from_table: "accounts".into(),
                    from_column: "customer_id".into(),
                    to_table: "customers".into(),
                    to_column: "id".into(),
                }],
            )
            .unwrap(),
        )
    }

    fn gate(rows: Option<u64>) -> SafetyGate {
        SafetyGate::new(SafetyConfig::default(), schema(rows))
    }

    fn decide(gate: &SafetyGate, sql: &str) -> GateDecision {
        let candidate = TranslationCandidate::parse(sql, 1.0).unwrap();
        match validate(candidate, &gate.schema) {
            Verdict::Valid(valid) => gate.check(valid),
            other => panic!("{sql} did not validate: {other:?}"),
        }
    }

    fn denied(sql: &str) -> DenyCategory {
        match decide(&gate(None), sql) {
            GateDecision::Deny(category) => category,
            GateDecision::Allow(a) => panic!("{sql} was allowed as {}", a.sql()),
        }
    }

    fn allowed(gate: &SafetyGate, sql: &str) -> ApprovedStatement {
        match decide(gate, sql) {
            GateDecision::Allow(approved) => approved,
            GateDecision::Deny(category) => panic!("{sql} was denied: {category}"),
        }
    }

    #[rstest]
    #[case("DELETE FROM transactions", DenyCategory::DataModification)]
    #[case("UPDATE accounts SET balance = 0", DenyCategory::DataModification)]
    #[case("DROP TABLE accounts", DenyCategory::DataModification)]
    #[case("SELECT id FROM accounts; DELETE FROM accounts", DenyCategory::DataModification)]
    #[case("SELECT id FROM accounts; SELECT id FROM customers", DenyCategory::MultipleStatements)]
    #[case("SELECT id FROM accounts LIMIT 5000", DenyCategory::UnboundedResult)]
    #[case("SELECT id FROM accounts LIMIT 10 + 5", DenyCategory::UnboundedResult)]
    fn denies(#[case] sql: &str, #[case] expected: DenyCategory) {
        assert_eq!(denied(sql), expected);
    }

    #[test]
    fn verbs_inside_literals_are_fine() {
        let approved = allowed(
            &gate(None),
            "SELECT id FROM accounts WHERE 'delete' <> 'drop table' LIMIT 10",
        );
        assert_eq!(approved.appended_limit(), None);
    }

    #[test]
    fn appends_default_limit() {
        let approved = allowed(&gate(None), "SELECT id FROM accounts");
        assert_eq!(approved.appended_limit(), Some(100));
        assert_eq!(approved.sql(), "SELECT id FROM accounts LIMIT 100");
    }

    #[test]
    fn single_row_aggregate_needs_no_limit() {
        let approved = allowed(&gate(None), "SELECT SUM(amount) FROM transactions");
        assert_eq!(approved.appended_limit(), None);
        assert_eq!(approved.sql(), "SELECT SUM(amount) FROM transactions");

        let grouped = allowed(
            &gate(None),
            "SELECT account_id, SUM(amount) FROM transactions GROUP BY account_id",
        );
        assert_eq!(grouped.appended_limit(), Some(100));
    }

    #[test]
    fn explicit_limit_within_ceiling_is_kept() {
        let approved = allowed(&gate(None), "SELECT id FROM accounts LIMIT 1000");
        assert_eq!(approved.appended_limit(), None);
        assert_eq!(approved.sql(), "SELECT id FROM accounts LIMIT 1000");
    }

    #[test]
    fn fan_out_uses_row_hints() {
        let sql = "SELECT a.id FROM accounts a JOIN customers c ON a.customer_id = c.id \
                   JOIN transactions t ON t.account_id = a.id";
        // 1000^3 exceeds the default ceiling of 10 million.
        assert!(matches!(
            decide(&gate(Some(1000)), sql),
            GateDecision::Deny(DenyCategory::ExcessiveFanOut)
        ));
        assert!(matches!(decide(&gate(Some(100)), sql), GateDecision::Allow(_)));
        // Without hints the check is skipped.
        assert!(matches!(decide(&gate(None), sql), GateDecision::Allow(_)));
    }

    #[test]
    fn subquery_tables_do_not_multiply_fan_out() {
        let nested = "SELECT id FROM transactions WHERE account_id IN \
                      (SELECT id FROM accounts WHERE customer_id IN (SELECT id FROM customers))";
        assert!(matches!(decide(&gate(Some(1000)), nested), GateDecision::Allow(_)));

        // A join inside the subquery is still estimated on its own.
        let joined_inside = "SELECT id FROM transactions WHERE account_id IN \
                             (SELECT a.id FROM accounts a JOIN customers c ON a.customer_id = c.id \
                              JOIN transactions t ON t.account_id = a.id)";
        assert!(matches!(
            decide(&gate(Some(1000)), joined_inside),
            GateDecision::Deny(DenyCategory::ExcessiveFanOut)
        ));
    }

    #[test]
    fn deny_categories_have_stable_names() {
        assert_eq!(DenyCategory::DataModification.to_string(), "data_modification");
        assert!(DenyCategory::ExcessiveFanOut.description().contains("too many rows"));
    }
}
