//! Data store configuration.

use serde::{Deserialize, Serialize};

fn default_path() -> String {
    "banking_system.db".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// Path to the `SQLite`/libSQL database file. Also settable via the
    /// legacy `DB_PATH` variable.
    #[serde(default = "default_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_path(),
        }
    }
}
