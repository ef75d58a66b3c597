//! # tellr-harness
//!
//! Regression harness: replays a JSON Lines corpus of scenarios through a
//! live [`tellr_pipeline::Pipeline`] and aggregates pass rate, latency and
//! per-category results into a [`Report`].
//!
//! Every scenario runs in its own session, starting `Idle`. Multi-turn
//! scenarios list the answers to give while the pipeline keeps asking.

mod error;
mod report;
mod runner;
mod scenario;

pub use error::HarnessError;
pub use report::{CategoryStats, Report, ScenarioRecord};
pub use runner::Harness;
pub use scenario::{Scenario, load_scenarios, normalize_sql};
