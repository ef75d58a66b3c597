//! # tellr-pipeline
//!
//! The translate, validate, gate, execute and clarify loop.
//!
//! [`Pipeline::ask`] takes a session id and a question and returns either an
//! [`Answer`] (rows plus an explanation) or a clarifying question. Each
//! session owns a [`ClarificationManager`]; sessions are independent and
//! may be driven concurrently.
//!
//! A schema mismatch or unparseable SQL gets one automatic retry with a
//! rewrite hint. Safety refusals and execution failures are never retried.

mod clarification;
mod error;
mod explain;
mod pipeline;
mod sessions;

pub use clarification::{ClarificationManager, ClarificationState};
pub use error::PipelineError;
pub use explain::explain;
pub use pipeline::{Answer, Outcome, Pipeline};
pub use sessions::{SessionHandle, SessionStore};
