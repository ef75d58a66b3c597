//! # tellr-db
//!
//! The execution engine: runs [`ApprovedStatement`](tellr_sql::ApprovedStatement)s
//! against a libSQL database under a hard timeout and a row cap, returning
//! a typed [`ExecutionResult`](tellr_core::result::ExecutionResult). Nothing
//! else in tellr performs I/O against the data store.
//!
//! Also ships the demo banking database used by `tellr init-db` and the
//! test suites.

mod engine;
pub mod error;
mod seed;

pub use engine::ExecutionEngine;
pub use error::{DatabaseError, ExecutionError};
pub use seed::{BANKING_DATA, BANKING_SCHEMA, TableCount, init_database};
