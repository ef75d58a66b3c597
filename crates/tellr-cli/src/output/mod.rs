use std::fmt::Write;

use serde::Serialize;
use serde_json::Value;
use tellr_core::result::ExecutionResult;
use tellr_core::schema::SchemaDescriptor;
use tellr_harness::Report;
use tellr_pipeline::Outcome;

use crate::cli::OutputFormat;
use crate::ui;

pub mod table;

fn options() -> table::TableOptions {
    let prefs = ui::prefs();
    table::TableOptions {
        max_width: prefs.term_width,
        color: prefs.table_color,
    }
}

/// Render a serializable response to a string in the requested format.
pub fn render<T: Serialize>(value: &T, format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(value)?),
        OutputFormat::Table => render_value_table(value),
        OutputFormat::Raw => Ok(serde_json::to_string(value)?),
    }
}

/// Print a serializable response in the requested format.
pub fn output<T: Serialize>(value: &T, format: OutputFormat) -> anyhow::Result<()> {
    let rendered = render(value, format)?;
    println!("{rendered}");
    Ok(())
}

/// An answer as a result table with its SQL and explanation, or the
/// clarifying question.
pub fn render_outcome(outcome: &Outcome, format: OutputFormat) -> anyhow::Result<String> {
    if format != OutputFormat::Table {
        return render(outcome, format);
    }
    Ok(match outcome {
        Outcome::Clarify { question } => question.clone(),
        Outcome::Answered(answer) => format!(
            "{}\n\nSQL: {}\n{}",
            result_table(&answer.result),
            answer.sql,
            answer.explanation
        ),
    })
}

pub fn result_table(result: &ExecutionResult) -> String {
    if result.row_count() == 0 {
        return String::from("(no rows)");
    }
    let headers = result.columns().iter().map(String::as_str).collect::<Vec<_>>();
    table::render_table(&headers, &result.display_rows(), options())
}

/// Summary lines, a per-category table and a per-scenario table.
pub fn render_report(report: &Report, format: OutputFormat) -> anyhow::Result<String> {
    if format != OutputFormat::Table {
        return render(report, format);
    }

    let mut text = format!(
        "Passed {}/{} ({:.1}%), grade {}\nLatency: mean {:.1} ms, p95 {:.1} ms\n",
        report.passed,
        report.total,
        report.pass_rate,
        report.grade,
        report.mean_latency_ms,
        report.p95_latency_ms
    );
    for (status, count) in &report.by_status {
        let _ = writeln!(text, "  {status}: {count}");
    }

    let categories = report
        .by_category
        .iter()
        .map(|(category, stats)| {
            vec![
                category.to_string(),
                stats.total.to_string(),
                stats.passed.to_string(),
                format!("{:.1}", stats.pass_rate),
            ]
        })
        .collect::<Vec<_>>();
    text.push('\n');
    text.push_str(&table::render_table(
        &["category", "total", "passed", "pass_rate"],
        &categories,
        options(),
    ));

    let records = report
        .records
        .iter()
        .map(|record| {
            vec![
                record.id.clone(),
                record.expected.to_string(),
                record.status.to_string(),
                if record.passed { "pass" } else { "fail" }.to_string(),
                format!("{:.0}", record.elapsed_ms),
                record.mismatch.clone().unwrap_or_default(),
            ]
        })
        .collect::<Vec<_>>();
    text.push_str("\n\n");
    text.push_str(&table::render_table(
        &["id", "expected", "status", "result", "ms", "detail"],
        &records,
        options(),
    ));
    Ok(text)
}

/// One row per column, with foreign keys alongside.
pub fn render_schema(schema: &SchemaDescriptor, format: OutputFormat) -> anyhow::Result<String> {
    if format != OutputFormat::Table {
        return render(schema, format);
    }

    let rows = schema
        .tables()
        .flat_map(|table| {
            table.columns.iter().map(move |column| {
                let references = schema
                    .foreign_keys()
                    .iter()
                    .find(|fk| {
                        fk.from_table.eq_ignore_ascii_case(&table.name)
                            && fk.from_column.eq_ignore_ascii_case(&column.name)
                    })
                    .map(|fk| format!("{}.{}", fk.to_table, fk.to_column))
                    .unwrap_or_default();
                vec![
                    table.name.clone(),
                    column.name.clone(),
                    column.data_type.clone(),
                    if column.nullable { "yes" } else { "no" }.to_string(),
                    references,
                ]
            })
        })
        .collect::<Vec<_>>();

    Ok(table::render_table(
        &["table", "column", "type", "nullable", "references"],
        &rows,
        options(),
    ))
}

fn render_value_table<T: Serialize>(value: &T) -> anyhow::Result<String> {
    let value = serde_json::to_value(value)?;
    match value {
        Value::Array(items) => Ok(render_array_table(&items)),
        Value::Object(map) => {
            let rows = map
                .into_iter()
                .map(|(key, value)| vec![key, value_to_cell(&value)])
                .collect::<Vec<_>>();
            Ok(table::render_table(&["key", "value"], &rows, options()))
        }
        scalar => Ok(value_to_cell(&scalar)),
    }
}

fn render_array_table(items: &[Value]) -> String {
    if items.is_empty() {
        return String::from("(no rows)");
    }

    let mut headers = Vec::<String>::new();
    for map in items.iter().filter_map(Value::as_object) {
        for key in map.keys() {
            if !headers.contains(key) {
                headers.push(key.clone());
            }
        }
    }
    if headers.is_empty() {
        let rows = items.iter().map(|item| vec![value_to_cell(item)]).collect::<Vec<_>>();
        return table::render_table(&["value"], &rows, options());
    }

    let header_refs = headers.iter().map(String::as_str).collect::<Vec<_>>();
    let rows = items
        .iter()
        .filter_map(Value::as_object)
        .map(|map| {
            headers
                .iter()
                .map(|header| map.get(header).map_or_else(|| String::from("-"), value_to_cell))
                .collect::<Vec<_>>()
        })
        .collect::<Vec<_>>();

    table::render_table(&header_refs, &rows, options())
}

fn value_to_cell(value: &Value) -> String {
    match value {
        Value::Null => String::from("null"),
        Value::Bool(v) => v.to_string(),
        Value::Number(v) => v.to_string(),
        Value::String(v) => v.clone(),
        other => serde_json::to_string(other).unwrap_or_else(|_| String::from("<invalid-json>")),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde::Serialize;
    use tellr_core::result::{CellValue, ResultRow};
    use tellr_core::schema::{ColumnDef, ForeignKey, TableDef};

    use super::*;

    #[derive(Serialize)]
    struct Created {
        table: &'static str,
        rows: u64,
    }

    fn column(name: &str, data_type: &str) -> ColumnDef {
        ColumnDef {
            name: name.into(),
            data_type: data_type.into(),
            nullable: false,
        }
    }

    #[test]
    fn json_render_is_valid_json() {
        let value = Created {
            table: "loans",
            rows: 16,
        };
        let out = render(&value, OutputFormat::Json).expect("json render should work");
        let parsed: Value = serde_json::from_str(&out).expect("json should parse");
        assert_eq!(parsed["table"], "loans");
        assert_eq!(parsed["rows"], 16);
    }

    #[test]
    fn raw_render_is_single_line_json() {
        let value = vec![Created {
            table: "loans",
            rows: 16,
        }];
        let out = render(&value, OutputFormat::Raw).expect("raw render should work");
        assert!(!out.contains('\n'));
    }

    #[test]
    fn array_of_objects_renders_as_table() {
        let value = vec![
            Created {
                table: "branches",
                rows: 6,
            },
            Created {
                table: "loans",
                rows: 16,
            },
        ];
        let out = render(&value, OutputFormat::Table).expect("table render should work");
        let lines: Vec<&str> = out.lines().collect();
        assert!(lines[0].contains("table"));
        assert!(lines[3].contains("loans"));
    }

    #[test]
    fn clarification_renders_as_plain_question() {
        let outcome = Outcome::Clarify {
            question: "Which date range do you mean?".into(),
        };
        assert_eq!(
            render_outcome(&outcome, OutputFormat::Table).unwrap(),
            "Which date range do you mean?"
        );
        assert!(
            render_outcome(&outcome, OutputFormat::Raw)
                .unwrap()
                .contains(r#""kind":"clarify""#)
        );
    }

    #[test]
    fn result_table_keeps_column_order() {
        let mut row = ResultRow::new();
        row.insert("z_last".into(), CellValue::Integer(1));
        row.insert("a_first".into(), CellValue::Null);
        let result = ExecutionResult::new(
            vec!["z_last".into(), "a_first".into()],
            vec![row],
            Duration::from_millis(1),
            false,
        );
        let out = result_table(&result);
        assert!(out.lines().next().unwrap().starts_with("z_last"));
        assert!(out.contains("null"));
    }

    #[test]
    fn schema_table_shows_references() {
        let schema = SchemaDescriptor::new(
            vec![
                TableDef {
                    name: "customers".into(),
                    columns: vec![column("customer_id", "INTEGER")],
                    row_estimate: None,
                },
                TableDef {
                    name: "accounts".into(),
                    columns: vec![
                        column("account_id", "INTEGER"),
                        column("customer_id", "INTEGER"),
                    ],
                    row_estimate: None,
                },
            ],
            vec![ForeignKey {
                from_table: "accounts".into(),
                from_column: "customer_id".into(),
                to_table: "customers".into(),
                to_column: "customer_id".into(),
            }],
        )
        .unwrap();

        let out = render_schema(&schema, OutputFormat::Table).unwrap();
        let line = out
            .lines()
            .find(|l| l.starts_with("accounts") && l.contains("customer_id"))
            .unwrap();
        assert!(line.ends_with("customers.customer_id"));
    }
}
