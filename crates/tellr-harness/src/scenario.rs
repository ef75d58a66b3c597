//! Scenario corpus: one JSON object per line.
//!
//! ```json
//! {"id": "checking", "question": "Show me all customers with checking accounts",
//!  "expected": "exact_match", "expected_sql": "SELECT ..."}
//! {"question": "Average amount this quarter?", "expected": "clarification_expected",
//!  "follow_ups": ["Q1 2024"]}
//! {"question": "Delete all transactions", "expected": "error_expected",
//!  "expected_status": "refused"}
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tellr_core::enums::{ExpectedCategory, OutcomeStatus};
use tellr_core::ids::{PREFIX_SCENARIO, format_id};

use crate::error::HarnessError;

/// One question and what the pipeline should do with it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    /// Assigned from the corpus position when absent.
    #[serde(default)]
    pub id: String,
    pub question: String,
    pub expected: ExpectedCategory,
    /// For `exact_match`: compared after whitespace and case normalisation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_sql: Option<String>,
    /// For `pattern_match`: every entry must appear in the SQL or the rows.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub expected_pattern: Vec<String>,
    /// Answers given, in order, while the pipeline keeps asking.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub follow_ups: Vec<String>,
    /// For `error_expected`: `refused` or `failed`. Any error passes when
    /// absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_status: Option<OutcomeStatus>,
}

impl Scenario {
    #[must_use]
    pub fn new(question: impl Into<String>, expected: ExpectedCategory) -> Self {
        Self {
            id: String::new(),
            question: question.into(),
            expected,
            expected_sql: None,
            expected_pattern: Vec::new(),
            follow_ups: Vec::new(),
            expected_status: None,
        }
    }

    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    #[must_use]
    pub fn with_sql(mut self, sql: impl Into<String>) -> Self {
        self.expected_sql = Some(sql.into());
        self
    }

    #[must_use]
    pub fn with_patterns<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.expected_pattern = patterns.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_follow_ups<I, S>(mut self, answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.follow_ups = answers.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_status(mut self, status: OutcomeStatus) -> Self {
        self.expected_status = Some(status);
        self
    }

    /// Check the fields the category depends on.
    ///
    /// # Errors
    ///
    /// Returns `HarnessError::InvalidScenario` for an empty question, an
    /// `exact_match` without SQL, a `pattern_match` without patterns or an
    /// `expected_status` that no error can have.
    pub fn check(&self) -> Result<(), HarnessError> {
        let invalid = |reason: &str| HarnessError::InvalidScenario {
            id: self.id.clone(),
            reason: reason.to_string(),
        };
        if self.question.trim().is_empty() {
            return Err(invalid("question is empty"));
        }
        match (self.expected, self.expected_status) {
            (_, None)
            | (
                ExpectedCategory::ErrorExpected,
                Some(OutcomeStatus::Refused | OutcomeStatus::Failed),
            ) => {}
            (ExpectedCategory::ErrorExpected, Some(_)) => {
                return Err(invalid("expected_status must be refused or failed"));
            }
            (_, Some(_)) => return Err(invalid("expected_status only applies to error_expected")),
        }
        match self.expected {
            ExpectedCategory::ExactMatch
                if self.expected_sql.as_deref().is_none_or(|s| s.trim().is_empty()) =>
            {
                Err(invalid("exact_match needs expected_sql"))
            }
            ExpectedCategory::PatternMatch if self.expected_pattern.is_empty() => {
                Err(invalid("pattern_match needs expected_pattern"))
            }
            _ => Ok(()),
        }
    }
}

/// Read and check a JSON Lines corpus.
///
/// # Errors
///
/// Returns `HarnessError::Read` if the file cannot be opened,
/// `HarnessError::Parse` for a malformed line and
/// `HarnessError::InvalidScenario` for an incomplete scenario.
pub fn load_scenarios(path: &Path) -> Result<Vec<Scenario>, HarnessError> {
    let lines = serde_jsonlines::json_lines::<Scenario, _>(path).map_err(|source| {
        HarnessError::Read {
            path: path.to_path_buf(),
            source,
        }
    })?;

    let mut scenarios = Vec::new();
    for (index, line) in lines.enumerate() {
        let entry = index + 1;
        let mut scenario = line.map_err(|e| HarnessError::Parse {
            entry,
            message: e.to_string(),
        })?;
        if scenario.id.trim().is_empty() {
            scenario.id = format_id(PREFIX_SCENARIO, u32::try_from(entry).unwrap_or(u32::MAX));
        }
        scenario.check()?;
        scenarios.push(scenario);
    }
    tracing::info!(path = %path.display(), scenarios = scenarios.len(), "scenarios loaded");
    Ok(scenarios)
}

/// Lower-case, single-spaced, without a trailing `;`.
#[must_use]
pub fn normalize_sql(sql: &str) -> String {
    let collapsed = sql.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed
        .trim_end_matches(';')
        .trim_end()
        .to_lowercase()
}
