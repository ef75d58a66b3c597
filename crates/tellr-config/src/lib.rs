//! # tellr-config
//!
//! Layered configuration loading for tellr using figment.
//!
//! Configuration sources (in priority order, highest wins):
//! 1. Environment variables (`TELLR_*` prefix, `__` as separator)
//! 2. Legacy variables `GROQ_API_KEY` and `DB_PATH`
//! 3. An explicit extra TOML file (`--config`)
//! 4. Project-level `.tellr/config.toml`
//! 5. User-level `~/.config/tellr/config.toml`
//! 6. Built-in defaults
//!
//! # Environment Variable Mapping
//!
//! Figment maps `TELLR_LLM__API_KEY` -> `llm.api_key`,
//! `TELLR_EXECUTION__ROW_CAP` -> `execution.row_cap`, etc.
//!
//! # Usage
//!
//! ```no_run
//! use tellr_config::TellrConfig;
//!
//! let config = TellrConfig::load_with_dotenv(None).expect("config");
//! if config.llm.is_configured() {
//!     println!("model: {}", config.llm.model);
//! }
//! ```

mod database;
mod error;
mod llm;
mod pipeline;

pub use database::DatabaseConfig;
pub use error::ConfigError;
pub use llm::LlmConfig;
pub use pipeline::{
    ClarificationConfig, ExecutionConfig, HarnessConfig, SafetyConfig, TranslatorConfig,
};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TellrConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub translator: TranslatorConfig,
    #[serde(default)]
    pub safety: SafetyConfig,
    #[serde(default)]
    pub execution: ExecutionConfig,
    #[serde(default)]
    pub clarification: ClarificationConfig,
    #[serde(default)]
    pub harness: HarnessConfig,
}

impl TellrConfig {
    /// Load configuration from all sources (TOML files + environment variables).
    ///
    /// Does NOT call `dotenvy` -- use [`Self::load_with_dotenv`] if you need
    /// `.env` file loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if extraction fails or a value is out of range.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Load configuration, layering `extra` on top of the discovered TOML
    /// files but below environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if extraction fails or a value is out of range.
    pub fn load_from(extra: Option<&Path>) -> Result<Self, ConfigError> {
        let config: Self = Self::figment(extra).extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration with `.env` file support. Variables already set
    /// in the environment win over the file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if extraction fails or a value is out of range.
    pub fn load_with_dotenv(extra: Option<&Path>) -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::load_from(extra)
    }

    /// Build the figment provider chain.
    ///
    /// This is public so tests can inspect the figment directly or add
    /// additional providers on top.
    #[must_use]
    pub fn figment(extra: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        // Layer 1: User-global config
        if let Some(global_path) = Self::global_config_path()
            && global_path.exists()
        {
            figment = figment.merge(Toml::file(global_path));
        }

        // Layer 2: Project-local config
        let local_path = PathBuf::from(".tellr/config.toml");
        if local_path.exists() {
            figment = figment.merge(Toml::file(local_path));
        }

        // Layer 3: Explicit file
        if let Some(path) = extra {
            figment = figment.merge(Toml::file(path));
        }

        // Layer 4: Legacy variables from the original deployment
        figment = figment
            .merge(
                Env::raw()
                    .only(&["GROQ_API_KEY"])
                    .map(|_| "llm.api_key".into()),
            )
            .merge(Env::raw().only(&["DB_PATH"]).map(|_| "database.path".into()));

        // Layer 5: Environment variables (highest priority)
        figment.merge(Env::prefixed("TELLR_").split("__"))
    }

    /// Reject values the pipeline cannot operate with.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |field: &str, reason: &str| ConfigError::InvalidValue {
            field: field.to_string(),
            reason: reason.to_string(),
        };

        if !(0.0..=1.0).contains(&self.translator.confidence_threshold) {
            return Err(invalid(
                "translator.confidence_threshold",
                "must be between 0 and 1",
            ));
        }
        if !(0.0..=1.0).contains(&self.translator.default_confidence) {
            return Err(invalid(
                "translator.default_confidence",
                "must be between 0 and 1",
            ));
        }
        if self.safety.default_limit == 0 {
            return Err(invalid("safety.default_limit", "must be positive"));
        }
        if self.safety.default_limit > self.safety.max_limit {
            return Err(invalid(
                "safety.default_limit",
                "must not exceed safety.max_limit",
            ));
        }
        if self.execution.row_cap == 0 {
            return Err(invalid("execution.row_cap", "must be positive"));
        }
        if self.execution.timeout_ms == 0 {
            return Err(invalid("execution.timeout_ms", "must be positive"));
        }
        if self.clarification.max_rounds == 0 {
            return Err(invalid("clarification.max_rounds", "must be positive"));
        }
        Ok(())
    }

    /// Fail unless a live language-model provider is configured.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::NotConfigured` when no API key is set.
    pub fn require_llm(&self) -> Result<&LlmConfig, ConfigError> {
        if self.llm.is_configured() {
            Ok(&self.llm)
        } else {
            Err(ConfigError::NotConfigured {
                section: "llm".to_string(),
            })
        }
    }

    /// Path to the user-global config file.
    fn global_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("tellr").join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = TellrConfig::default();
        assert!(config.validate().is_ok());
        assert!(!config.llm.is_configured());
        assert_eq!(config.database.path, "banking_system.db");
    }

    #[test]
    fn require_llm_fails_without_key() {
        let config = TellrConfig::default();
        assert!(matches!(
            config.require_llm(),
            Err(ConfigError::NotConfigured { section }) if section == "llm"
        ));
    }

    #[test]
    fn validate_rejects_default_limit_above_ceiling() {
        let mut config = TellrConfig::default();
        config.safety.default_limit = 5000;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("safety.default_limit"));
    }

    #[test]
    fn validate_rejects_zero_row_cap() {
        let mut config = TellrConfig::default();
        config.execution.row_cap = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_threshold_out_of_range() {
        let mut config = TellrConfig::default();
        config.translator.confidence_threshold = 1.5;
        assert!(config.validate().is_err());
    }
}
