//! Translate, validate and gate the reference banking questions end to end,
//! with a scripted model standing in for the hosted one.

use std::sync::Arc;

use pretty_assertions::assert_eq;
use tellr_config::{SafetyConfig, TranslatorConfig};
use tellr_core::context::ConversationContext;
use tellr_core::schema::{ColumnDef, ForeignKey, SchemaDescriptor, TableDef};
use tellr_llm::ScriptedModel;
use tellr_sql::{
    DenyCategory, GateDecision, SafetyGate, Translation, TranslationCandidate, Translator,
    Verdict, validate,
};

fn table(name: &str, columns: &[(&str, &str)]) -> TableDef {
    TableDef {
        name: name.into(),
        columns: columns
            .iter()
            .map(|(column, data_type)| ColumnDef {
                name: (*column).into(),
                data_type: (*data_type).into(),
                nullable: false,
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

fn bank() -> Arc<SchemaDescriptor> {
    Arc::new(
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
                        ("created_at", "TEXT"),
                    ],
                ),
            ],
            vec![
                fk(("accounts", "customer_id"), ("customers", "id")),
                fk(("transactions", "account_id"), ("accounts", "id")),
                fk(("transactions", "employee_id"), ("employees", "id")),
            ],
        )
        .unwrap(),
    )
}

fn translator(model: Arc<ScriptedModel>) -> Translator {
    Translator::new(model, &TranslatorConfig::default())
}

async fn candidate_for(model: ScriptedModel, question: &str) -> TranslationCandidate {
    let schema = bank();
    let context = ConversationContext::new(10);
    match translator(Arc::new(model))
        .translate(question, &context, &schema)
        .await
        .unwrap()
    {
        Translation::Candidate(candidate) => candidate,
        Translation::Clarify(request) => panic!("unexpected clarification: {}", request.question),
    }
}

#[tokio::test]
async fn checking_accounts_join_on_foreign_key() {
    let model = ScriptedModel::new().with_rule(
        "checking accounts",
        "SELECT c.id, c.name FROM customers c JOIN accounts a ON a.customer_id = c.id \
         WHERE a.type = 'checking'",
    );
    let candidate =
        candidate_for(model, "Show me all customers with checking accounts").await;
    assert_eq!(candidate.referenced_tables(), ["customers", "accounts"]);
    assert!(!candidate.is_aggregate());

    let schema = bank();
    let Verdict::Valid(valid) = validate(candidate, &schema) else {
        panic!("expected a valid verdict");
    };
    let GateDecision::Allow(approved) =
        SafetyGate::new(SafetyConfig::default(), schema).check(valid)
    else {
        panic!("expected the gate to allow a read");
    };
    assert_eq!(approved.appended_limit(), Some(100));
    assert!(approved.sql().ends_with("LIMIT 100"));
}

#[tokio::test]
async fn relative_quarter_without_anchor_asks_for_dates() {
    let model =
        Arc::new(ScriptedModel::new().with_fallback("SELECT AVG(amount) FROM transactions"));
    let schema = bank();
    let context = ConversationContext::new(10);

    let translation = translator(Arc::clone(&model))
        .translate(
            "What's the average transaction amount this quarter?",
            &context,
            &schema,
        )
        .await
        .unwrap();

    let Translation::Clarify(request) = translation else {
        panic!("expected a clarification request");
    };
    assert!(request.question.contains("date range"));
    assert_eq!(model.calls(), 0, "the model must not be asked to guess");
}

#[tokio::test]
async fn busiest_employees_group_by_employee() {
    let model = ScriptedModel::new().with_rule(
        "most transactions",
        "```sql\nSELECT e.id, e.name, COUNT(t.id) AS handled\n\
         FROM employees e JOIN transactions t ON t.employee_id = e.id\n\
         GROUP BY e.id, e.name\nORDER BY handled DESC\nLIMIT 5;\n```",
    );
    let candidate =
        candidate_for(model, "Which employees handled the most transactions?").await;
    assert!(candidate.is_aggregate());

    let schema = bank();
    let verdict = validate(candidate, &schema);
    assert_eq!(verdict.label(), "valid");
    let Verdict::Valid(valid) = verdict else {
        unreachable!()
    };
    let GateDecision::Allow(approved) =
        SafetyGate::new(SafetyConfig::default(), schema).check(valid)
    else {
        panic!("expected the gate to allow a read");
    };
    assert_eq!(approved.appended_limit(), None);
}

#[test]
fn busiest_employees_without_group_by_is_rejected() {
    let candidate = TranslationCandidate::parse(
        "SELECT e.name, COUNT(t.id) FROM employees e \
         JOIN transactions t ON t.employee_id = e.id",
        0.9,
    )
    .unwrap();
    match validate(candidate, &bank()) {
        Verdict::SchemaMismatch { identifier, .. } => assert_eq!(identifier, "e.name"),
        other => panic!("expected a grouping mismatch, got {}", other.label()),
    }
}

#[tokio::test]
async fn delete_request_is_refused() {
    let model = ScriptedModel::new().with_rule("delete", "DELETE FROM transactions");
    let candidate = candidate_for(model, "Delete all transactions").await;

    let schema = bank();
    let Verdict::Valid(valid) = validate(candidate, &schema) else {
        panic!("the statement names real tables");
    };
    match SafetyGate::new(SafetyConfig::default(), schema).check(valid) {
        GateDecision::Deny(category) => assert_eq!(category, DenyCategory::DataModification),
        GateDecision::Allow(_) => panic!("a delete must never be approved"),
    }
}

#[test]
fn shared_column_name_is_ambiguous() {
    let candidate = TranslationCandidate::parse(
        "SELECT name FROM customers c JOIN accounts a ON a.customer_id = c.id \
         JOIN transactions t ON t.account_id = a.id \
         JOIN employees e ON t.employee_id = e.id",
        0.9,
    )
    .unwrap();
    match validate(candidate, &bank()) {
        Verdict::Ambiguous { question, .. } => {
            assert!(question.contains("customers.name"));
            assert!(question.contains("employees.name"));
        }
        other => panic!("expected ambiguity, got {}", other.label()),
    }
}

#[test]
fn verdicts_are_repeatable() {
    let sql = "SELECT c.name, a.balance FROM customers c JOIN accounts a ON a.customer_id = c.id";
    let labels: Vec<&str> = (0..3)
        .map(|_| validate(TranslationCandidate::parse(sql, 0.9).unwrap(), &bank()).label())
        .collect();
    assert_eq!(labels, ["schema_mismatch"; 3]);
}
