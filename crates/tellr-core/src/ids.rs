//! ID prefixes and formatting helpers.
//!
//! IDs are `{prefix}-{8 hex chars}`, e.g. `ses-0000002a`.

/// Conversation session.
pub const PREFIX_SESSION: &str = "ses";

/// Scenario in a harness corpus that did not declare its own id.
pub const PREFIX_SCENARIO: &str = "scn";

/// Format an ID from a prefix and a numeric suffix.
#[must_use]
pub fn format_id(prefix: &str, n: u32) -> String {
    format!("{prefix}-{n:08x}")
}

/// Generate a session ID from the current wall clock.
///
/// Uniqueness is only needed within a single process's session store.
#[must_use]
pub fn new_session_id() -> String {
    let nanos = chrono::Utc::now().timestamp_subsec_nanos();
    let secs = chrono::Utc::now().timestamp();
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let mixed = (secs as u32).rotate_left(13) ^ nanos;
    format_id(PREFIX_SESSION, mixed)
}
