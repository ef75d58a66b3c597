//! Static shape analysis of parsed SQL.
//!
//! Everything downstream of the translator (validator, safety gate,
//! explanations) works from a [`StatementShape`] instead of re-walking the
//! AST: which tables and columns a statement touches, which column
//! equalities it relies on, how its top-level projection aggregates, and
//! how its row count is bounded.

use std::ops::ControlFlow;

use sqlparser::ast::{
    BinaryOperator, Expr, Function, FunctionArguments, GroupByExpr, LimitClause, ObjectName,
    ObjectNamePart, Query, Select, SelectItem, SetExpr, Statement, TableFactor, Value, Visit,
    Visitor, visit_expressions,
};

const AGGREGATES: [&str; 7] = ["count", "sum", "avg", "min", "max", "total", "group_concat"];

/// A column as written: optional qualifier (table or alias) and name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnUse {
    pub qualifier: Option<String>,
    pub name: String,
}

impl ColumnUse {
    fn from_expr(expr: &Expr) -> Option<Self> {
        match expr {
            Expr::Identifier(ident) => Some(Self {
                qualifier: None,
                name: ident.value.clone(),
            }),
            Expr::CompoundIdentifier(parts) if parts.len() >= 2 => Some(Self {
                qualifier: Some(parts[parts.len() - 2].value.clone()),
                name: parts[parts.len() - 1].value.clone(),
            }),
            _ => None,
        }
    }
}

impl std::fmt::Display for ColumnUse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.qualifier {
            Some(q) => write!(f, "{q}.{}", self.name),
            None => f.write_str(&self.name),
        }
    }
}

/// One occurrence of a base table in the statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableUse {
    pub name: String,
    pub alias: Option<String>,
    /// Scope whose `FROM` list names the table.
    pub scope: usize,
}

/// One query level. Scope 0 is the statement itself; every query and
/// subquery opens a new one under the scope it is written in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scope {
    /// Enclosing scope, visible to correlated references.
    pub parent: Option<usize>,
    /// Reads a CTE, derived table or table function.
    pub opaque: bool,
}

/// A column reference and the scope it is written in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopedColumn {
    pub scope: usize,
    pub column: ColumnUse,
}

/// `left = right` where both sides are plain column references.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Equality {
    pub scope: usize,
    pub left: ColumnUse,
    pub right: ColumnUse,
}

/// One top-level select-list item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectionItem {
    /// Explicit `AS` alias.
    pub alias: Option<String>,
    /// Contains an aggregate function call (window calls excluded).
    pub aggregated: bool,
    /// `*` or `t.*`.
    pub wildcard: bool,
    pub columns: Vec<ColumnUse>,
}

impl ProjectionItem {
    /// Not aggregated and reads at least one column.
    #[must_use]
    pub fn is_bare(&self) -> bool {
        !self.aggregated && (self.wildcard || !self.columns.is_empty())
    }
}

/// One `GROUP BY` key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupKey {
    Column(ColumnUse),
    /// 1-based select-list position.
    Position(usize),
    Expression,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupBy {
    None,
    All,
    Keys(Vec<GroupKey>),
}

/// How the top-level query bounds its row count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitBound {
    Absent,
    Literal(u64),
    /// An expression the gate cannot evaluate statically.
    NonLiteral,
}

/// Statement kind by leading verb.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatementKind {
    Query,
    Other(String),
}

/// Everything the downstream stages need to know about one statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatementShape {
    pub kind: StatementKind,
    /// Base-table occurrences in visit order; CTE references excluded.
    pub tables: Vec<TableUse>,
    pub scopes: Vec<Scope>,
    /// Scope of the top-level select list.
    pub top_scope: usize,
    /// Names bound by `WITH`, derived tables and table functions; columns
    /// qualified by these are not checked against the schema.
    pub opaque_names: Vec<String>,
    pub columns: Vec<ScopedColumn>,
    pub equalities: Vec<Equality>,
    pub projection: Vec<ProjectionItem>,
    pub group_by: GroupBy,
    pub filtered: bool,
    pub limit: LimitBound,
}

impl StatementShape {
    /// Analyze one parsed statement.
    #[must_use]
    pub fn of(statement: &Statement) -> Self {
        let mut collector = Collector::new();
        let _ = statement.visit(&mut collector);

        let top_scope = if matches!(statement, Statement::Query(_)) {
            collector.first_query.unwrap_or(0)
        } else {
            0
        };
        let mut shape = Self {
            kind: statement_kind(statement),
            tables: Vec::new(),
            scopes: collector.scopes,
            top_scope,
            opaque_names: collector.opaque,
            columns: Vec::new(),
            equalities: collector.equalities,
            projection: Vec::new(),
            group_by: GroupBy::None,
            filtered: false,
            limit: LimitBound::Absent,
        };

        for table in collector.relations {
            if shape.is_opaque(&table.name) {
                shape.scopes[table.scope].opaque = true;
            } else {
                shape.tables.push(table);
            }
        }

        for column in collector.columns {
            if !shape.columns.contains(&column) {
                shape.columns.push(column);
            }
        }

        if let Statement::Query(query) = statement {
            shape.limit = limit_bound(query);
            if let SetExpr::Select(select) = query.body.as_ref() {
                shape.projection = select.projection.iter().map(projection_item).collect();
                shape.group_by = group_by(select, &shape.projection);
                shape.filtered = select.selection.is_some();
            }
        }

        shape
    }

    /// Whether `name` is bound by the statement rather than the schema.
    #[must_use]
    pub fn is_opaque(&self, name: &str) -> bool {
        self.opaque_names
            .iter()
            .any(|o| o.eq_ignore_ascii_case(name))
    }

    /// Distinct base-table names in first-seen order.
    #[must_use]
    pub fn table_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for table in &self.tables {
            if !names.iter().any(|n| n.eq_ignore_ascii_case(&table.name)) {
                names.push(&table.name);
            }
        }
        names
    }

    /// Table occurrences named in `scope`'s own `FROM` list.
    pub fn tables_in(&self, scope: usize) -> impl Iterator<Item = &TableUse> {
        self.tables.iter().filter(move |t| t.scope == scope)
    }

    /// `scope` followed by each enclosing scope, innermost first.
    pub fn visible_scopes(&self, scope: usize) -> impl Iterator<Item = usize> + '_ {
        std::iter::successors(Some(scope), |&s| self.scopes.get(s).and_then(|sc| sc.parent))
    }

    /// Whether `scope` reads a relation the schema cannot describe.
    #[must_use]
    pub fn reads_opaque(&self, scope: usize) -> bool {
        self.scopes.get(scope).is_some_and(|s| s.opaque)
    }

    /// Table behind a qualifier as seen from `scope`: the innermost scope
    /// that binds it wins, an alias before a bare table name.
    #[must_use]
    pub fn table_for_qualifier(&self, scope: usize, qualifier: &str) -> Option<&str> {
        self.visible_scopes(scope).find_map(|s| {
            let here: Vec<&TableUse> = self.tables_in(s).collect();
            here.iter()
                .copied()
                .find(|t| {
                    t.alias
                        .as_deref()
                        .is_some_and(|a| a.eq_ignore_ascii_case(qualifier))
                })
                .or_else(|| {
                    here.iter()
                        .copied()
                        .find(|t| t.name.eq_ignore_ascii_case(qualifier))
                })
                .map(|t| t.name.as_str())
        })
    }

    /// Whether `name` is a select-list alias (usable in `ORDER BY`).
    #[must_use]
    pub fn is_output_alias(&self, name: &str) -> bool {
        self.projection.iter().any(|p| {
            p.alias
                .as_deref()
                .is_some_and(|a| a.eq_ignore_ascii_case(name))
        })
    }

    /// Any top-level select item aggregates.
    #[must_use]
    pub fn is_aggregate(&self) -> bool {
        self.projection.iter().any(|p| p.aggregated)
    }

    /// Aggregates without grouping or bare columns: exactly one row.
    #[must_use]
    pub fn is_single_row_aggregate(&self) -> bool {
        self.is_aggregate()
            && matches!(self.group_by, GroupBy::None)
            && !self.projection.iter().any(ProjectionItem::is_bare)
    }

    /// Table occurrences of every scope that joins two or more.
    #[must_use]
    pub fn join_groups(&self) -> Vec<Vec<&TableUse>> {
        (0..self.scopes.len())
            .map(|scope| self.tables_in(scope).collect::<Vec<_>>())
            .filter(|group| group.len() > 1)
            .collect()
    }

    /// Number of joins, counted within each scope's `FROM` list.
    #[must_use]
    pub fn join_count(&self) -> usize {
        self.join_groups().iter().map(|g| g.len() - 1).sum()
    }

    #[must_use]
    pub const fn is_grouped(&self) -> bool {
        !matches!(self.group_by, GroupBy::None)
    }
}

struct Collector {
    relations: Vec<TableUse>,
    /// Alias of the table factor whose name is visited next.
    pending_alias: Option<String>,
    scopes: Vec<Scope>,
    stack: Vec<usize>,
    first_query: Option<usize>,
    opaque: Vec<String>,
    columns: Vec<ScopedColumn>,
    equalities: Vec<Equality>,
}

impl Collector {
    fn new() -> Self {
        Self {
            relations: Vec::new(),
            pending_alias: None,
            scopes: vec![Scope {
                parent: None,
                opaque: false,
            }],
            stack: vec![0],
            first_query: None,
            opaque: Vec::new(),
            columns: Vec::new(),
            equalities: Vec::new(),
        }
    }

    fn current(&self) -> usize {
        self.stack.last().copied().unwrap_or(0)
    }

    fn mark_opaque(&mut self) {
        let scope = self.current();
        self.scopes[scope].opaque = true;
    }
}

impl Visitor for Collector {
    type Break = ();

    fn pre_visit_query(&mut self, query: &Query) -> ControlFlow<Self::Break> {
        let id = self.scopes.len();
        self.scopes.push(Scope {
            parent: Some(self.current()),
            opaque: false,
        });
        self.stack.push(id);
        self.first_query.get_or_insert(id);

        if let Some(with) = &query.with {
            for cte in &with.cte_tables {
                self.opaque.push(cte.alias.name.value.clone());
            }
        }
        ControlFlow::Continue(())
    }

    fn post_visit_query(&mut self, _query: &Query) -> ControlFlow<Self::Break> {
        self.stack.pop();
        ControlFlow::Continue(())
    }

    fn pre_visit_relation(&mut self, relation: &ObjectName) -> ControlFlow<Self::Break> {
        let alias = self.pending_alias.take();
        if let Some(name) = object_name(relation) {
            self.relations.push(TableUse {
                name,
                alias,
                scope: self.current(),
            });
        }
        ControlFlow::Continue(())
    }

    fn pre_visit_table_factor(&mut self, factor: &TableFactor) -> ControlFlow<Self::Break> {
        match factor {
            TableFactor::Table { name, alias, .. } => {
                self.pending_alias = None;
                if let (Some(alias), Some(table)) = (alias, object_name(name)) {
                    if self.opaque.iter().any(|o| o.eq_ignore_ascii_case(&table)) {
                        // Alias of a CTE reference.
                        self.opaque.push(alias.name.value.clone());
                    } else {
                        self.pending_alias = Some(alias.name.value.clone());
                    }
                }
            }
            TableFactor::Derived { alias, .. }
            | TableFactor::TableFunction { alias, .. }
            | TableFactor::Function { alias, .. } => {
                self.mark_opaque();
                if let Some(alias) = alias {
                    self.opaque.push(alias.name.value.clone());
                }
            }
            _ => {}
        }
        ControlFlow::Continue(())
    }

    fn pre_visit_expr(&mut self, expr: &Expr) -> ControlFlow<Self::Break> {
        let scope = self.current();
        if let Some(column) = ColumnUse::from_expr(expr) {
            self.columns.push(ScopedColumn { scope, column });
        } else if let Expr::BinaryOp {
            left,
            op: BinaryOperator::Eq,
            right,
        } = expr
            && let (Some(left), Some(right)) =
                (ColumnUse::from_expr(left), ColumnUse::from_expr(right))
        {
            self.equalities.push(Equality { scope, left, right });
        }
        ControlFlow::Continue(())
    }
}

/// Last identifier of a possibly schema-qualified name.
fn object_name(name: &ObjectName) -> Option<String> {
    match name.0.last()? {
        ObjectNamePart::Identifier(ident) => Some(ident.value.clone()),
        #[allow(unreachable_patterns)]
        _ => None,
    }
}

fn statement_kind(statement: &Statement) -> StatementKind {
    if matches!(statement, Statement::Query(_)) {
        return StatementKind::Query;
    }
    let text = statement.to_string();
    let verb = text
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_ascii_uppercase();
    StatementKind::Other(verb)
}

fn is_aggregate_call(function: &Function) -> bool {
    if function.over.is_some() {
        return false;
    }
    let Some(name) = object_name(&function.name) else {
        return false;
    };
    let name = name.to_ascii_lowercase();
    if !AGGREGATES.contains(&name.as_str()) {
        return false;
    }
    // min(a, b) and max(a, b) are scalar in SQLite.
    match &function.args {
        FunctionArguments::List(list) if name == "min" || name == "max" => list.args.len() == 1,
        _ => true,
    }
}

fn projection_item(item: &SelectItem) -> ProjectionItem {
    let (expr, alias) = match item {
        SelectItem::UnnamedExpr(expr) => (expr, None),
        SelectItem::ExprWithAlias { expr, alias } => (expr, Some(alias.value.clone())),
        _ => {
            return ProjectionItem {
                alias: None,
                aggregated: false,
                wildcard: true,
                columns: Vec::new(),
            };
        }
    };

    let mut aggregated = false;
    let mut columns = Vec::new();
    let _ = visit_expressions(expr, |e| {
        if let Expr::Function(f) = e
            && is_aggregate_call(f)
        {
            aggregated = true;
        } else if let Some(column) = ColumnUse::from_expr(e) {
            columns.push(column);
        }
        ControlFlow::<()>::Continue(())
    });

    ProjectionItem {
        alias,
        aggregated,
        wildcard: false,
        columns,
    }
}

fn group_by(select: &Select, projection: &[ProjectionItem]) -> GroupBy {
    match &select.group_by {
        GroupByExpr::All(_) => GroupBy::All,
        GroupByExpr::Expressions(exprs, _) if exprs.is_empty() => GroupBy::None,
        GroupByExpr::Expressions(exprs, _) => GroupBy::Keys(
            exprs
                .iter()
                .map(|expr| group_key(expr, projection))
                .collect(),
        ),
    }
}

fn group_key(expr: &Expr, projection: &[ProjectionItem]) -> GroupKey {
    if let Some(position) = literal_u64(expr) {
        return usize::try_from(position).map_or(GroupKey::Expression, GroupKey::Position);
    }
    match ColumnUse::from_expr(expr) {
        Some(column) => {
            // A bare name matching an output alias groups by that item.
            if column.qualifier.is_none()
                && let Some(i) = projection.iter().position(|p| {
                    p.alias
                        .as_deref()
                        .is_some_and(|a| a.eq_ignore_ascii_case(&column.name))
                })
            {
                return GroupKey::Position(i + 1);
            }
            GroupKey::Column(column)
        }
        None => GroupKey::Expression,
    }
}

fn literal_u64(expr: &Expr) -> Option<u64> {
    match expr {
        Expr::Value(v) => match &v.value {
            Value::Number(n, _) => n.parse().ok(),
            _ => None,
        },
        _ => None,
    }
}

fn limit_expr_bound(expr: &Expr) -> LimitBound {
    literal_u64(expr).map_or(LimitBound::NonLiteral, LimitBound::Literal)
}

fn limit_bound(query: &Query) -> LimitBound {
    match &query.limit_clause {
        None | Some(LimitClause::LimitOffset { limit: None, .. }) => LimitBound::Absent,
        Some(LimitClause::LimitOffset {
            limit: Some(limit), ..
        })
        | Some(LimitClause::OffsetCommaLimit { limit, .. }) => limit_expr_bound(limit),
    }
}
