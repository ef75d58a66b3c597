//! Integration tests for TOML configuration loading.
//!
//! Uses figment::Jail for safe, sandboxed file and env var manipulation.

use figment::{
    Figment, Jail,
    providers::{Format, Serialized, Toml},
};
use pretty_assertions::assert_eq;
use tellr_config::TellrConfig;

#[test]
fn loads_llm_config_from_toml() {
    Jail::expect_with(|jail| {
        jail.create_file(
            "config.toml",
            r#"
[llm]
base_url = "http://localhost:11434/v1"
api_key = "local-key"
model = "qwen2.5-coder"
timeout_secs = 90
temperature = 0.2
"#,
        )?;

        let config: TellrConfig = Figment::from(Serialized::defaults(TellrConfig::default()))
            .merge(Toml::file("config.toml"))
            .extract()?;

        assert_eq!(config.llm.base_url, "http://localhost:11434/v1");
        assert_eq!(config.llm.api_key, "local-key");
        assert_eq!(config.llm.model, "qwen2.5-coder");
        assert_eq!(config.llm.timeout_secs, 90);
        assert!(config.llm.is_configured());
        Ok(())
    });
}

#[test]
fn loads_pipeline_knobs_from_toml() {
    Jail::expect_with(|jail| {
        jail.create_file(
            "config.toml",
            r#"
[translator]
confidence_threshold = 0.7

[safety]
default_limit = 25
max_limit = 200
max_fan_out = 1000

[execution]
timeout_ms = 250
row_cap = 10

[clarification]
max_rounds = 2
context_window = 4

[harness]
concurrency = 8
"#,
        )?;

        let config: TellrConfig = Figment::from(Serialized::defaults(TellrConfig::default()))
            .merge(Toml::file("config.toml"))
            .extract()?;

        assert!((config.translator.confidence_threshold - 0.7).abs() < f64::EPSILON);
        assert_eq!(config.safety.default_limit, 25);
        assert_eq!(config.safety.max_limit, 200);
        assert_eq!(config.safety.max_fan_out, 1000);
        assert_eq!(config.execution.timeout_ms, 250);
        assert_eq!(config.execution.row_cap, 10);
        assert_eq!(config.clarification.max_rounds, 2);
        assert_eq!(config.clarification.context_window, 4);
        assert_eq!(config.harness.concurrency, 8);
        assert!(config.validate().is_ok());
        Ok(())
    });
}

#[test]
fn partial_sections_keep_defaults() {
    Jail::expect_with(|jail| {
        jail.create_file(
            "config.toml",
            r#"
[execution]
row_cap = 42
"#,
        )?;

        let config: TellrConfig = Figment::from(Serialized::defaults(TellrConfig::default()))
            .merge(Toml::file("config.toml"))
            .extract()?;

        assert_eq!(config.execution.row_cap, 42);
        assert_eq!(config.execution.timeout_ms, 5000);
        assert_eq!(config.safety.default_limit, 100);
        Ok(())
    });
}

#[test]
fn load_from_rejects_invalid_values() {
    Jail::expect_with(|jail| {
        jail.create_file(
            "bad.toml",
            r#"
[safety]
default_limit = 500
max_limit = 100
"#,
        )?;

        let result = TellrConfig::load_from(Some(std::path::Path::new("bad.toml")));
        assert!(result.is_err());
        Ok(())
    });
}
