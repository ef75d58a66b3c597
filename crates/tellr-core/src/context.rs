//! Bounded conversation history for one session.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How a turn was resolved by the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "text", rename_all = "snake_case")]
pub enum TurnResolution {
    /// The statement that was executed for this turn.
    Sql(String),
    /// The clarifying question that was asked back.
    Clarification(String),
    /// The turn ended in an error; holds the user-facing message.
    Failed(String),
}

/// One question and its resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub question: String,
    pub resolution: TurnResolution,
    pub at: DateTime<Utc>,
}

/// Ordered, append-only window of recent turns.
///
/// Old turns fall off the front once `capacity` is reached; nothing is ever
/// rolled back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationContext {
    turns: VecDeque<Turn>,
    capacity: usize,
}

impl ConversationContext {
    /// Create an empty context keeping at most `capacity` turns (minimum 1).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            turns: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, question: impl Into<String>, resolution: TurnResolution) {
        if self.turns.len() == self.capacity {
            self.turns.pop_front();
        }
        self.turns.push_back(Turn {
            question: question.into(),
            resolution,
            at: Utc::now(),
        });
    }

    /// Turns oldest-first.
    pub fn turns(&self) -> impl DoubleEndedIterator<Item = &Turn> + ExactSizeIterator {
        self.turns.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// The most recent turn that ended in executed SQL.
    #[must_use]
    pub fn last_sql(&self) -> Option<&str> {
        self.turns.iter().rev().find_map(|t| match &t.resolution {
            TurnResolution::Sql(sql) => Some(sql.as_str()),
            _ => None,
        })
    }
}

impl Default for ConversationContext {
    fn default() -> Self {
        Self::new(10)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_drops_oldest_turn() {
        let mut ctx = ConversationContext::new(2);
        ctx.push("q1", TurnResolution::Sql("SELECT 1".into()));
        ctx.push("q2", TurnResolution::Clarification("which?".into()));
        ctx.push("q3", TurnResolution::Failed("boom".into()));

        let questions: Vec<&str> = ctx.turns().map(|t| t.question.as_str()).collect();
        assert_eq!(questions, ["q2", "q3"]);
        assert_eq!(ctx.len(), 2);
    }

    #[test]
    fn zero_capacity_is_clamped() {
        let mut ctx = ConversationContext::new(0);
        ctx.push("q1", TurnResolution::Sql("SELECT 1".into()));
        assert_eq!(ctx.capacity(), 1);
        assert_eq!(ctx.len(), 1);
    }

    #[test]
    fn last_sql_skips_clarifications() {
        let mut ctx = ConversationContext::default();
        ctx.push("q1", TurnResolution::Sql("SELECT 1".into()));
        ctx.push("q2", TurnResolution::Clarification("which?".into()));
        assert_eq!(ctx.last_sql(), Some("SELECT 1"));
    }
}
