//! # tellr-core
//!
//! Core types and error types for tellr.
//!
//! This crate provides the foundational types shared across all tellr crates:
//! - Schema snapshot (`SchemaDescriptor`) and column resolution results
//! - Conversation context with a bounded turn window
//! - Typed execution results
//! - Scenario categories and outcome statuses with their string forms
//! - ID prefix constants and formatting helpers
//! - Cross-cutting error types

pub mod context;
pub mod enums;
pub mod errors;
pub mod ids;
pub mod result;
pub mod schema;
