//! Concurrent scenario replay.

use std::sync::Arc;
use std::time::Instant;

use tellr_core::enums::{ExpectedCategory, OutcomeStatus};
use tellr_pipeline::{Answer, Outcome, Pipeline, PipelineError};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::report::{Report, ScenarioRecord};
use crate::scenario::{Scenario, normalize_sql};

/// Replays scenarios through a shared pipeline.
pub struct Harness {
    pipeline: Arc<Pipeline>,
    concurrency: usize,
}

impl Harness {
    /// `concurrency` is clamped to at least one scenario in flight.
    #[must_use]
    pub fn new(pipeline: Arc<Pipeline>, concurrency: usize) -> Self {
        Self {
            pipeline,
            concurrency: concurrency.max(1),
        }
    }

    /// Run every scenario once, each in a fresh session, and aggregate.
    ///
    /// Records come back in corpus order whatever order the scenarios
    /// finish in.
    pub async fn run(&self, scenarios: Vec<Scenario>) -> Report {
        let total = scenarios.len();
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut set = JoinSet::new();
        let mut slots: Vec<Option<ScenarioRecord>> = vec![None; total];

        tracing::info!(scenarios = total, concurrency = self.concurrency, "harness started");

        for (idx, scenario) in scenarios.iter().cloned().enumerate() {
            let pipeline = Arc::clone(&self.pipeline);
            let sem = Arc::clone(&semaphore);
            set.spawn(async move {
                let Ok(_permit) = sem.acquire().await else {
                    return (idx, aborted(&scenario, "harness shut down"));
                };
                (idx, run_scenario(&pipeline, &scenario, idx).await)
            });
        }

        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((idx, record)) => slots[idx] = Some(record),
                Err(e) => tracing::warn!(error = %e, "scenario task failed"),
            }
        }

        let records = slots
            .into_iter()
            .zip(&scenarios)
            .map(|(slot, scenario)| {
                slot.unwrap_or_else(|| aborted(scenario, "scenario task panicked"))
            })
            .collect();

        let report = Report::from_records(records);
        tracing::info!(
            passed = report.passed,
            total = report.total,
            pass_rate = report.pass_rate,
            "harness finished"
        );
        report
    }
}

fn aborted(scenario: &Scenario, reason: &str) -> ScenarioRecord {
    ScenarioRecord {
        id: scenario.id.clone(),
        question: scenario.question.clone(),
        expected: scenario.expected,
        status: OutcomeStatus::Failed,
        passed: false,
        elapsed_ms: 0.0,
        sql: None,
        row_count: None,
        clarification: None,
        error: Some(reason.to_string()),
        mismatch: Some(reason.to_string()),
    }
}

/// Drive one scenario to a terminal outcome, answering clarifications from
/// `follow_ups` in order.
async fn run_scenario(pipeline: &Pipeline, scenario: &Scenario, idx: usize) -> ScenarioRecord {
    let session_id = format!("harness-{}-{idx}", scenario.id);
    let started = Instant::now();

    let mut outcome = pipeline.ask(&session_id, &scenario.question).await;
    let first_clarified = matches!(outcome, Ok(Outcome::Clarify { .. }));
    let mut clarification = None;
    let mut answers = scenario.follow_ups.iter();

    // A scenario expecting a clarification is judged on the first reply.
    if scenario.expected != ExpectedCategory::ClarificationExpected {
        while let Ok(Outcome::Clarify { question }) = &outcome {
            let Some(answer) = answers.next() else {
                break;
            };
            clarification = Some(question.clone());
            outcome = pipeline.ask(&session_id, answer).await;
        }
    }
    let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
    pipeline.sessions().remove(&session_id);

    let mut record = ScenarioRecord {
        id: scenario.id.clone(),
        question: scenario.question.clone(),
        expected: scenario.expected,
        status: OutcomeStatus::Failed,
        passed: false,
        elapsed_ms,
        sql: None,
        row_count: None,
        clarification,
        error: None,
        mismatch: None,
    };

    match &outcome {
        Ok(Outcome::Answered(answer)) => {
            record.status = OutcomeStatus::Answered;
            record.sql = Some(answer.sql.clone());
            record.row_count = Some(answer.result.row_count());
        }
        Ok(Outcome::Clarify { question }) => {
            record.status = OutcomeStatus::Clarification;
            record.clarification = Some(question.clone());
        }
        Err(err) => {
            record.status = err.status();
            record.error = Some(err.user_message());
        }
    }

    let verdict = judge(scenario, &outcome, first_clarified);
    record.passed = verdict.is_ok();
    record.mismatch = verdict.err();

    tracing::info!(
        id = %record.id,
        status = %record.status,
        passed = record.passed,
        elapsed_ms = record.elapsed_ms,
        "scenario finished"
    );
    record
}

/// `Ok` when the outcome is what the scenario expects, otherwise why not.
fn judge(
    scenario: &Scenario,
    outcome: &Result<Outcome, PipelineError>,
    first_clarified: bool,
) -> Result<(), String> {
    match scenario.expected {
        ExpectedCategory::ClarificationExpected => {
            if first_clarified {
                Ok(())
            } else {
                Err("expected a clarifying question".to_string())
            }
        }
        ExpectedCategory::ErrorExpected => match (outcome, scenario.expected_status) {
            (Err(err), Some(wanted)) if err.status() != wanted => Err(format!(
                "expected {wanted}, got {}: {}",
                err.status(),
                err.user_message()
            )),
            (Err(_), _) => Ok(()),
            (Ok(_), _) => Err("expected a refusal or failure".to_string()),
        },
        ExpectedCategory::ExactMatch => {
            let answer = answered(outcome)?;
            let expected = normalize_sql(scenario.expected_sql.as_deref().unwrap_or_default());
            if normalize_sql(&answer.candidate_sql) == expected
                || normalize_sql(&answer.sql) == expected
            {
                Ok(())
            } else {
                Err(format!("SQL differs: {}", answer.candidate_sql))
            }
        }
        ExpectedCategory::PatternMatch => {
            let answer = answered(outcome)?;
            let haystack = searchable_text(answer);
            match scenario
                .expected_pattern
                .iter()
                .find(|p| !haystack.contains(&p.to_lowercase()))
            {
                None => Ok(()),
                Some(missing) => Err(format!("pattern '{missing}' not found")),
            }
        }
    }
}

fn answered(outcome: &Result<Outcome, PipelineError>) -> Result<&Answer, String> {
    match outcome {
        Ok(Outcome::Answered(answer)) => Ok(answer),
        Ok(Outcome::Clarify { question }) => Err(format!("asked instead: {question}")),
        Err(err) => Err(format!("failed: {}", err.user_message())),
    }
}

/// Lower-cased SQL followed by every rendered cell, one per line.
fn searchable_text(answer: &Answer) -> String {
    let mut text = answer.sql.to_lowercase();
    for row in answer.result.display_rows() {
        for cell in row {
            text.push('\n');
            text.push_str(&cell.to_lowercase());
        }
    }
    text
}
