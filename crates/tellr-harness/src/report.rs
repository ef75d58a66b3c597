//! Per-scenario records and their aggregate report.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tellr_core::enums::{ExpectedCategory, OutcomeStatus, PerformanceGrade};

use crate::error::HarnessError;

/// What happened to one scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioRecord {
    pub id: String,
    pub question: String,
    pub expected: ExpectedCategory,
    pub status: OutcomeStatus,
    pub passed: bool,
    pub elapsed_ms: f64,
    /// Executed SQL, when the pipeline answered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sql: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row_count: Option<usize>,
    /// The last clarifying question asked, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clarification: Option<String>,
    /// User-facing error message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Why the scenario failed, when it did.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mismatch: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CategoryStats {
    pub total: usize,
    pub passed: usize,
    pub pass_rate: f64,
}

/// Aggregate over one harness run. Rates are percentages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub total: usize,
    pub passed: usize,
    pub pass_rate: f64,
    pub mean_latency_ms: f64,
    pub p95_latency_ms: f64,
    pub grade: PerformanceGrade,
    pub by_category: BTreeMap<ExpectedCategory, CategoryStats>,
    pub by_status: BTreeMap<OutcomeStatus, usize>,
    pub records: Vec<ScenarioRecord>,
}

#[allow(clippy::cast_precision_loss)]
fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 * 100.0 / whole as f64
    }
}

/// Nearest-rank percentile of ascending `sorted` values.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss
)]
fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = (p / 100.0 * sorted.len() as f64).ceil() as usize;
    sorted[rank.clamp(1, sorted.len()) - 1]
}

impl Report {
    #[must_use]
    pub fn from_records(records: Vec<ScenarioRecord>) -> Self {
        let total = records.len();
        let passed = records.iter().filter(|r| r.passed).count();

        let mut latencies: Vec<f64> = records.iter().map(|r| r.elapsed_ms).collect();
        latencies.sort_by(f64::total_cmp);
        #[allow(clippy::cast_precision_loss)]
        let mean_latency_ms = if total == 0 {
            0.0
        } else {
            latencies.iter().sum::<f64>() / total as f64
        };

        let mut by_category = BTreeMap::new();
        for category in ExpectedCategory::ALL {
            let (count, ok) = records
                .iter()
                .filter(|r| r.expected == category)
                .fold((0, 0), |(n, p), r| (n + 1, p + usize::from(r.passed)));
            if count > 0 {
                by_category.insert(
                    category,
                    CategoryStats {
                        total: count,
                        passed: ok,
                        pass_rate: percent(ok, count),
                    },
                );
            }
        }

        let mut by_status = BTreeMap::new();
        for record in &records {
            *by_status.entry(record.status).or_insert(0) += 1;
        }

        let pass_rate = percent(passed, total);
        Self {
            total,
            passed,
            pass_rate,
            mean_latency_ms,
            p95_latency_ms: percentile(&latencies, 95.0),
            grade: PerformanceGrade::from_pass_rate(pass_rate),
            by_category,
            by_status,
            records,
        }
    }

    /// Whether the pass rate reaches `min_pass_rate` percent.
    #[must_use]
    pub fn meets(&self, min_pass_rate: f64) -> bool {
        self.pass_rate >= min_pass_rate
    }

    /// Write the report as pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns `HarnessError::Write` if the file cannot be written.
    pub fn write_json(&self, path: &Path) -> Result<(), HarnessError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).map_err(|source| HarnessError::Write {
            path: path.to_path_buf(),
            source,
        })
    }
}
