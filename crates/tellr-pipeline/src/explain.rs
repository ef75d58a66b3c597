//! Plain-language description of an answered question.

use std::fmt::Write;

use tellr_core::result::ExecutionResult;
use tellr_sql::shape::StatementShape;

fn list(names: &[&str]) -> String {
    match names {
        [] => String::new(),
        [one] => (*one).to_string(),
        [init @ .., last] => format!("{} and {last}", init.join(", ")),
    }
}

/// Describe what the statement consulted and what came back.
///
/// Built from the statement shape and the result alone, so the same inputs
/// always give the same text.
#[must_use]
pub fn explain(
    shape: &StatementShape,
    result: &ExecutionResult,
    appended_limit: Option<u64>,
) -> String {
    let tables = shape.table_names();
    let mut text = if tables.is_empty() {
        "Computed the answer directly".to_string()
    } else {
        format!("Looked up {}", list(&tables))
    };

    match shape.join_count() {
        0 => {}
        1 => text.push_str(" (1 join)"),
        n => {
            let _ = write!(text, " ({n} joins)");
        }
    }

    let mut steps = Vec::new();
    if shape.filtered {
        steps.push("filtered the rows");
    }
    if shape.is_grouped() {
        steps.push("grouped them");
    }
    if shape.is_aggregate() {
        steps.push("aggregated the values");
    }
    if !steps.is_empty() {
        text.push_str(", ");
        text.push_str(&list(&steps));
    }

    let rows = result.row_count();
    let noun = if rows == 1 { "row" } else { "rows" };
    let _ = write!(
        text,
        ". Returned {rows} {noun} in {} ms.",
        result.elapsed().as_millis()
    );

    if result.truncated() {
        text.push_str(" More rows matched; only the first ones are shown.");
    } else if let Some(limit) = appended_limit
        && u64::try_from(rows).is_ok_and(|r| r == limit)
    {
        let _ = write!(text, " Limited to the first {limit} rows.");
    }
    text
}
