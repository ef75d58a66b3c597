//! Scenario categories, outcome statuses and report grades.
//!
//! All enums use `snake_case` serialization via `#[serde(rename_all = "snake_case")]`.

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// ExpectedCategory
// ---------------------------------------------------------------------------

/// What a scenario expects the pipeline to do with its question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpectedCategory {
    /// Rows are returned and the executed SQL matches the expected SQL.
    ExactMatch,
    /// Rows are returned and the SQL or rows contain every expected pattern.
    PatternMatch,
    /// The pipeline asks a clarifying question.
    ClarificationExpected,
    /// The pipeline refuses or fails.
    ErrorExpected,
}

impl ExpectedCategory {
    pub const ALL: [Self; 4] = [
        Self::ExactMatch,
        Self::PatternMatch,
        Self::ClarificationExpected,
        Self::ErrorExpected,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ExactMatch => "exact_match",
            Self::PatternMatch => "pattern_match",
            Self::ClarificationExpected => "clarification_expected",
            Self::ErrorExpected => "error_expected",
        }
    }
}

impl fmt::Display for ExpectedCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// OutcomeStatus
// ---------------------------------------------------------------------------

/// Coarse classification of what one pipeline run produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Answered,
    Clarification,
    Refused,
    Failed,
}

impl OutcomeStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Answered => "answered",
            Self::Clarification => "clarification",
            Self::Refused => "refused",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// PerformanceGrade
// ---------------------------------------------------------------------------

/// Grade band for a scenario run's pass rate.
///
/// ```text
/// >= 90% outstanding, >= 80% excellent, >= 70% good, >= 60% fair, else needs_work
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PerformanceGrade {
    Outstanding,
    Excellent,
    Good,
    Fair,
    NeedsWork,
}

impl PerformanceGrade {
    /// Grade a pass rate expressed as a percentage (0..=100).
    #[must_use]
    pub fn from_pass_rate(percent: f64) -> Self {
        if percent >= 90.0 {
            Self::Outstanding
        } else if percent >= 80.0 {
            Self::Excellent
        } else if percent >= 70.0 {
            Self::Good
        } else if percent >= 60.0 {
            Self::Fair
        } else {
            Self::NeedsWork
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Outstanding => "outstanding",
            Self::Excellent => "excellent",
            Self::Good => "good",
            Self::Fair => "fair",
            Self::NeedsWork => "needs_work",
        }
    }
}

impl fmt::Display for PerformanceGrade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
