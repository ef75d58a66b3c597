//! # tellr-sql
//!
//! Everything between a question and an executable statement:
//!
//! - [`Translator`]: prompts the language model and turns its reply into a
//!   [`TranslationCandidate`] or a [`ClarificationRequest`].
//! - [`validate`]: static schema checks producing a [`Verdict`].
//! - [`SafetyGate`]: read-only and bounded-result enforcement producing
//!   the [`ApprovedStatement`] the execution engine requires.
//!
//! Candidate, validated candidate and approved statement are distinct
//! types, so a statement cannot reach execution without passing both
//! checks.

mod candidate;
mod deixis;
mod error;
mod response;
mod safety;
pub mod shape;
mod translator;
mod validator;

pub use candidate::TranslationCandidate;
pub use deixis::{UnresolvedReference, unresolved_reference};
pub use error::TranslateError;
pub use response::{ModelReply, extract_sql, parse_reply};
pub use safety::{ApprovedStatement, DenyCategory, GateDecision, SafetyGate};
pub use translator::{ClarificationRequest, Translation, Translator};
pub use validator::{ValidatedCandidate, Verdict, validate};
