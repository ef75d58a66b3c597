//! Tuning knobs for the translate-validate-execute-clarify pipeline.
//!
//! None of these are load-bearing constants; every threshold and cap that
//! the pipeline consults lives here.

use serde::{Deserialize, Serialize};

const fn default_confidence_threshold() -> f64 {
    0.5
}

const fn default_confidence() -> f64 {
    0.8
}

const fn default_limit() -> u64 {
    100
}

const fn default_max_limit() -> u64 {
    1000
}

const fn default_max_fan_out() -> u64 {
    10_000_000
}

const fn default_timeout_ms() -> u64 {
    5000
}

const fn default_row_cap() -> usize {
    500
}

const fn default_max_rounds() -> u32 {
    3
}

const fn default_context_window() -> usize {
    10
}

const fn default_concurrency() -> usize {
    4
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TranslatorConfig {
    /// Candidates below this confidence become clarification requests.
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f64,

    /// Confidence assumed when the model omits a `CONFIDENCE:` line.
    #[serde(default = "default_confidence")]
    pub default_confidence: f64,
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: default_confidence_threshold(),
            default_confidence: default_confidence(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SafetyConfig {
    /// Bound appended to statements that have none.
    #[serde(default = "default_limit")]
    pub default_limit: u64,

    /// Largest explicit `LIMIT` a statement may carry.
    #[serde(default = "default_max_limit")]
    pub max_limit: u64,

    /// Ceiling on the product of joined table sizes.
    #[serde(default = "default_max_fan_out")]
    pub max_fan_out: u64,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
            max_limit: default_max_limit(),
            max_fan_out: default_max_fan_out(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExecutionConfig {
    /// Hard per-statement timeout.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Rows kept before the result is marked truncated.
    #[serde(default = "default_row_cap")]
    pub row_cap: usize,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            row_cap: default_row_cap(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClarificationConfig {
    /// Clarification rounds allowed per question before giving up.
    #[serde(default = "default_max_rounds")]
    pub max_rounds: u32,

    /// Turns of conversation history kept per session.
    #[serde(default = "default_context_window")]
    pub context_window: usize,
}

impl Default for ClarificationConfig {
    fn default() -> Self {
        Self {
            max_rounds: default_max_rounds(),
            context_window: default_context_window(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HarnessConfig {
    /// Scenarios run in parallel, each in its own session.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
        }
    }
}
