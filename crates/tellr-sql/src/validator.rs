//! Static schema checks on candidate statements.
//!
//! Checks run in a fixed order and the first failure decides the verdict:
//!
//! 1. every referenced table exists;
//! 2. every column exists on its stated table, or resolves to exactly one
//!    table of the innermost query scope that has it;
//! 3. column equalities across tables follow a declared foreign key or
//!    compare type-compatible columns;
//! 4. when aggregates are mixed with bare columns, every bare column is
//!    grouped.
//!
//! An identifier that is genuinely absent is a [`Verdict::SchemaMismatch`]
//! (the translator gets one more try). An identifier that resolves to more
//! than one column is [`Verdict::Ambiguous`] (the user is asked).

use tellr_core::schema::{Affinity, ColumnRef, ColumnResolution, SchemaDescriptor, TableDef};

use crate::candidate::TranslationCandidate;
use crate::shape::{ColumnUse, Equality, GroupBy, GroupKey, StatementShape};

/// A candidate that passed every schema check. Only [`validate`] creates
/// one, and only the safety gate consumes it.
#[derive(Debug, Clone)]
pub struct ValidatedCandidate {
    candidate: TranslationCandidate,
}

impl ValidatedCandidate {
    #[must_use]
    pub const fn candidate(&self) -> &TranslationCandidate {
        &self.candidate
    }

    #[must_use]
    pub fn into_candidate(self) -> TranslationCandidate {
        self.candidate
    }
}

/// Outcome of [`validate`].
#[derive(Debug, Clone)]
pub enum Verdict {
    Valid(ValidatedCandidate),
    /// An identifier does not exist; likely a translation defect.
    SchemaMismatch { reason: String, identifier: String },
    /// An identifier matches several columns; the user must choose.
    Ambiguous { reason: String, question: String },
}

impl Verdict {
    /// Short label for logs and tests.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Valid(_) => "valid",
            Self::SchemaMismatch { .. } => "schema_mismatch",
            Self::Ambiguous { .. } => "ambiguous",
        }
    }
}

enum Failure {
    Mismatch { reason: String, identifier: String },
    Ambiguous { reason: String, question: String },
}

fn mismatch(reason: String, identifier: impl Into<String>) -> Failure {
    Failure::Mismatch {
        reason,
        identifier: identifier.into(),
    }
}

/// Classify `candidate` against `schema`.
///
/// Pure: the same candidate and schema always yield the same verdict.
#[must_use]
pub fn validate(candidate: TranslationCandidate, schema: &SchemaDescriptor) -> Verdict {
    let result = check(candidate.shape(), schema);
    let verdict = match result {
        Ok(()) => Verdict::Valid(ValidatedCandidate { candidate }),
        Err(Failure::Mismatch { reason, identifier }) => {
            Verdict::SchemaMismatch { reason, identifier }
        }
        Err(Failure::Ambiguous { reason, question }) => Verdict::Ambiguous { reason, question },
    };
    tracing::debug!(verdict = verdict.label(), "candidate validated");
    verdict
}

fn check(shape: &StatementShape, schema: &SchemaDescriptor) -> Result<(), Failure> {
    check_tables(shape, schema)?;
    check_columns(shape, schema)?;
    check_joins(shape, schema)?;
    check_grouping(shape)
}

fn check_tables(shape: &StatementShape, schema: &SchemaDescriptor) -> Result<(), Failure> {
    for name in shape.table_names() {
        if schema.table(name).is_none() {
            return Err(mismatch(format!("table '{name}' does not exist"), name));
        }
    }
    Ok(())
}

/// Where a column reference points, when it points into the schema.
enum Resolved {
    Column(ColumnRef),
    /// Bound by the statement itself (CTE, derived table, output alias).
    Local,
}

/// Distinct schema tables named in one scope's `FROM` list.
fn scope_tables<'s>(
    shape: &StatementShape,
    schema: &'s SchemaDescriptor,
    scope: usize,
) -> Vec<&'s TableDef> {
    let mut defs: Vec<&TableDef> = Vec::new();
    for table in shape.tables_in(scope) {
        if let Some(def) = schema.table(&table.name)
            && !defs.iter().any(|d| d.name.eq_ignore_ascii_case(&def.name))
        {
            defs.push(def);
        }
    }
    defs
}

fn ambiguous(name: &str, owners: &[ColumnRef]) -> Failure {
    let choices: Vec<String> = owners
        .iter()
        .map(|o| format!("{}.{}", o.table, o.column))
        .collect();
    Failure::Ambiguous {
        reason: format!("column '{name}' exists on several tables"),
        question: format!("Which \"{name}\" do you mean: {}?", choices.join(" or ")),
    }
}

/// Resolve `column` as written in `scope`. A bare name binds to the
/// innermost scope whose tables have it; enclosing scopes are only
/// consulted when nothing closer matches.
fn resolve(
    column: &ColumnUse,
    scope: usize,
    shape: &StatementShape,
    schema: &SchemaDescriptor,
) -> Result<Resolved, Failure> {
    if let Some(qualifier) = &column.qualifier {
        if shape.is_opaque(qualifier) {
            return Ok(Resolved::Local);
        }
        let Some(table) = shape.table_for_qualifier(scope, qualifier) else {
            return Err(mismatch(
                format!("'{qualifier}' is not a table or alias in this query"),
                qualifier.clone(),
            ));
        };
        return schema.column(table, &column.name).map_or_else(
            || {
                Err(mismatch(
                    format!("column '{}' does not exist on table '{table}'", column.name),
                    column.to_string(),
                ))
            },
            |def| {
                Ok(Resolved::Column(ColumnRef {
                    table: table.to_string(),
                    column: def.name.clone(),
                    data_type: def.data_type.clone(),
                }))
            },
        );
    }

    for level in shape.visible_scopes(scope) {
        match schema.resolve_column_in(&column.name, scope_tables(shape, schema, level)) {
            ColumnResolution::Unique(found) => return Ok(Resolved::Column(found)),
            ColumnResolution::Ambiguous(owners) => return Err(ambiguous(&column.name, &owners)),
            // May be a column of the CTE or derived table read here.
            ColumnResolution::Missing if shape.reads_opaque(level) => return Ok(Resolved::Local),
            ColumnResolution::Missing => {}
        }
    }

    if shape.is_output_alias(&column.name) {
        return Ok(Resolved::Local);
    }
    Err(mismatch(
        format!(
            "column '{}' does not exist on any table in the query",
            column.name
        ),
        column.name.clone(),
    ))
}

fn check_columns(shape: &StatementShape, schema: &SchemaDescriptor) -> Result<(), Failure> {
    for site in &shape.columns {
        resolve(&site.column, site.scope, shape, schema)?;
    }
    Ok(())
}

fn check_joins(shape: &StatementShape, schema: &SchemaDescriptor) -> Result<(), Failure> {
    for Equality { scope, left, right } in &shape.equalities {
        let (Resolved::Column(l), Resolved::Column(r)) = (
            resolve(left, *scope, shape, schema)?,
            resolve(right, *scope, shape, schema)?,
        ) else {
            continue;
        };
        if l.table.eq_ignore_ascii_case(&r.table) && left.qualifier == right.qualifier {
            continue;
        }
        if schema.has_foreign_key(
            (l.table.as_str(), l.column.as_str()),
            (r.table.as_str(), r.column.as_str()),
        ) {
            continue;
        }
        if !Affinity::of(&l.data_type).comparable_with(Affinity::of(&r.data_type)) {
            return Err(mismatch(
                format!(
                    "join compares {}.{} ({}) with {}.{} ({})",
                    l.table, l.column, l.data_type, r.table, r.column, r.data_type
                ),
                format!("{left} = {right}"),
            ));
        }
    }
    Ok(())
}

/// Two qualifiers name the same table occurrence in the top-level query:
/// the same text, or an alias and the table name of a table read once.
fn same_source(shape: &StatementShape, a: &str, b: &str) -> bool {
    if a.eq_ignore_ascii_case(b) {
        return true;
    }
    let scope = shape.top_scope;
    match (
        shape.table_for_qualifier(scope, a),
        shape.table_for_qualifier(scope, b),
    ) {
        (Some(x), Some(y)) if x.eq_ignore_ascii_case(y) => {
            shape
                .tables_in(scope)
                .filter(|t| t.name.eq_ignore_ascii_case(x))
                .count()
                == 1
        }
        _ => false,
    }
}

fn check_grouping(shape: &StatementShape) -> Result<(), Failure> {
    if !shape.is_aggregate() || matches!(shape.group_by, GroupBy::All) {
        return Ok(());
    }
    let keys: &[GroupKey] = match &shape.group_by {
        GroupBy::Keys(keys) => keys,
        GroupBy::None | GroupBy::All => &[],
    };

    for (index, item) in shape.projection.iter().enumerate() {
        if !item.is_bare() || keys.contains(&GroupKey::Position(index + 1)) {
            continue;
        }
        if item.wildcard {
            return Err(mismatch(
                "'*' selected alongside an aggregate without grouping".into(),
                "*",
            ));
        }
        for column in &item.columns {
            let grouped = keys.iter().any(|key| match key {
                GroupKey::Column(g) => {
                    g.name.eq_ignore_ascii_case(&column.name)
                        && match (&g.qualifier, &column.qualifier) {
                            (Some(a), Some(b)) => same_source(shape, a, b),
                            _ => true,
                        }
                }
                GroupKey::Position(_) | GroupKey::Expression => false,
            });
            if !grouped {
                return Err(mismatch(
                    format!("column '{column}' is selected with an aggregate but not grouped"),
                    column.to_string(),
                ));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use tellr_core::schema::{ColumnDef, ForeignKey};

    fn table(name: &str, columns: &[(&str, &str)]) -> TableDef {
        TableDef {
            name: name.into(),
            columns: columns
                .iter()
                .map(|(c, t)| ColumnDef {
                    name: (*c).into(),
                    data_type: (*t).into(),
                    nullable: true,
                })
                .collect(),
            row_estimate: None,
        }
    }

    fn fk(from: (&str, &str), to: (&str, &str)) -> ForeignKey {
        ForeignKey {
            from_table: from.0.into(),
            from_column: from.1.into(),
            to_table: to.0.into(),
            to_column: to.1.into(),
        }
    }

    fn schema() -> SchemaDescriptor {
        SchemaDescriptor::new(
            vec![
                table("customers", &[("id", "INTEGER"), ("name", "TEXT")]),
                table(
                    "accounts",
                    &[("id", "INTEGER"), ("customer_id", "INTEGER"), ("type", "TEXT")],
                ),
                table("employees", &[("id", "INTEGER"), ("name", "TEXT")]),
                table(
                    "transactions",
                    &[
                        ("id", "INTEGER"),
                        ("account_id", "INTEGER"),
                        ("employee_id", "INTEGER"),
                        ("amount", "REAL"),
                        ("note", "TEXT"),
                    ],
                ),
            ],
            vec![
                fk(("accounts", "customer_id"), ("customers", "id")),
                fk(("transactions", "account_id"), ("accounts", "id")),
                fk(("transactions", "employee_id"), ("employees", "id")),
            ],
        )
        .unwrap()
    }

    fn verdict(sql: &str) -> Verdict {
        validate(TranslationCandidate::parse(sql, 1.0).unwrap(), &schema())
    }

    #[rstest]
    #[case(
        "SELECT c.id, c.name FROM customers c JOIN accounts a ON a.customer_id = c.id \
         WHERE a.type = 'checking'"
    )]
    #[case(
        "SELECT e.name, COUNT(t.id) AS handled FROM employees e \
         JOIN transactions t ON t.employee_id = e.id GROUP BY e.id, e.name ORDER BY handled DESC"
    )]
    #[case("SELECT AVG(amount) FROM transactions")]
    #[case("SELECT type, COUNT(*) FROM accounts GROUP BY 1")]
    #[case("SELECT customers.name FROM customers, accounts WHERE accounts.customer_id = customers.id")]
    #[case(
        "WITH big AS (SELECT account_id, SUM(amount) AS total FROM transactions GROUP BY account_id) \
         SELECT b.account_id, total FROM big b"
    )]
    #[case("DELETE FROM transactions")]
    #[case(
        "SELECT name FROM customers WHERE id IN \
         (SELECT customer_id FROM accounts WHERE type = 'checking')"
    )]
    #[case(
        "SELECT name FROM customers WHERE EXISTS \
         (SELECT 1 FROM accounts WHERE accounts.customer_id = customers.id AND type = 'checking')"
    )]
    #[case(
        "SELECT id FROM accounts WHERE customer_id IN (SELECT id FROM customers WHERE name = 'Ada')"
    )]
    #[case("SELECT e.name, COUNT(*) FROM employees e GROUP BY employees.name")]
    #[case(
        "SELECT e.name, COUNT(t.id) FROM employees e JOIN transactions t ON t.employee_id = e.id \
         GROUP BY employees.name"
    )]
    fn valid_statements(#[case] sql: &str) {
        let v = verdict(sql);
        assert!(matches!(v, Verdict::Valid(_)), "{sql}: {v:?}");
    }

    #[rstest]
    #[case("SELECT * FROM branches", "branches")]
    #[case("SELECT balance FROM accounts", "balance")]
    #[case("SELECT a.balance FROM accounts a", "a.balance")]
    #[case("SELECT x.id FROM accounts a", "x")]
    #[case("SELECT name FROM accounts", "name")]
    fn mismatches(#[case] sql: &str, #[case] identifier: &str) {
        match verdict(sql) {
            Verdict::SchemaMismatch { identifier: got, .. } => assert_eq!(got, identifier),
            other => panic!("{sql}: expected mismatch, got {other:?}"),
        }
    }

    #[test]
    fn shared_column_name_is_ambiguous() {
        match verdict("SELECT name FROM customers JOIN employees ON customers.id = employees.id") {
            Verdict::Ambiguous { question, .. } => {
                assert!(question.contains("customers.name"));
                assert!(question.contains("employees.name"));
            }
            other => panic!("expected ambiguous, got {other:?}"),
        }
    }

    #[test]
    fn ambiguity_is_judged_within_one_scope() {
        // Both tables share the inner scope, so a bare "name" is still ambiguous.
        let sql = "SELECT id FROM accounts WHERE customer_id IN \
                   (SELECT customers.id FROM customers JOIN employees ON customers.id = employees.id \
                    WHERE name = 'Ada')";
        match verdict(sql) {
            Verdict::Ambiguous { question, .. } => assert!(question.contains("employees.name")),
            other => panic!("expected ambiguous, got {other:?}"),
        }
    }

    #[test]
    fn inner_alias_is_not_visible_outside() {
        match verdict("SELECT a.id FROM customers WHERE id IN (SELECT customer_id FROM accounts a)") {
            Verdict::SchemaMismatch { identifier, .. } => assert_eq!(identifier, "a"),
            other => panic!("expected mismatch, got {other:?}"),
        }
    }

    #[test]
    fn self_join_grouping_still_distinguishes_aliases() {
        let sql = "SELECT x.type, COUNT(*) FROM accounts x JOIN accounts y \
                   ON x.customer_id = y.customer_id GROUP BY y.type";
        assert!(matches!(verdict(sql), Verdict::SchemaMismatch { .. }));
    }

    #[test]
    fn join_without_fk_needs_compatible_types() {
        match verdict("SELECT t.id FROM transactions t JOIN customers c ON t.note = c.id") {
            Verdict::SchemaMismatch { reason, .. } => assert!(reason.contains("join compares")),
            other => panic!("expected mismatch, got {other:?}"),
        }
        // Same affinity without a declared edge is allowed.
        assert!(matches!(
            verdict("SELECT t.id FROM transactions t JOIN employees e ON t.account_id = e.id"),
            Verdict::Valid(_)
        ));
    }

    #[test]
    fn aggregate_requires_grouping_of_bare_columns() {
        match verdict(
            "SELECT e.name, COUNT(t.id) FROM employees e JOIN transactions t ON t.employee_id = e.id",
        ) {
            Verdict::SchemaMismatch { identifier, .. } => assert_eq!(identifier, "e.name"),
            other => panic!("expected mismatch, got {other:?}"),
        }
        assert!(matches!(
            verdict("SELECT *, COUNT(*) FROM accounts"),
            Verdict::SchemaMismatch { .. }
        ));
    }

    #[test]
    fn verdict_is_deterministic() {
        let sql = "SELECT name FROM customers JOIN employees ON customers.id = employees.id";
        assert_eq!(verdict(sql).label(), verdict(sql).label());
    }
}
