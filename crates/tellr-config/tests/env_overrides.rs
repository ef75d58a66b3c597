use figment::Jail;
use pretty_assertions::assert_eq;
use tellr_config::TellrConfig;

#[test]
fn prefixed_env_sets_nested_values() {
    Jail::expect_with(|jail| {
        jail.set_env("TELLR_EXECUTION__ROW_CAP", "7");
        jail.set_env("TELLR_LLM__MODEL", "llama-3.3-70b-versatile");

        let config = TellrConfig::load().expect("config loads");
        assert_eq!(config.execution.row_cap, 7);
        assert_eq!(config.llm.model, "llama-3.3-70b-versatile");
        Ok(())
    });
}

#[test]
fn legacy_variables_fill_config_values() {
    Jail::expect_with(|jail| {
        jail.set_env("GROQ_API_KEY", "gsk_legacy");
        jail.set_env("DB_PATH", "src/banking_system.db");

        let config = TellrConfig::load().expect("config loads");
        assert_eq!(config.llm.api_key, "gsk_legacy");
        assert_eq!(config.database.path, "src/banking_system.db");
        Ok(())
    });
}

#[test]
fn prefixed_env_beats_legacy_variables() {
    Jail::expect_with(|jail| {
        jail.set_env("GROQ_API_KEY", "gsk_legacy");
        jail.set_env("TELLR_LLM__API_KEY", "gsk_prefixed");

        let config = TellrConfig::load().expect("config loads");
        assert_eq!(config.llm.api_key, "gsk_prefixed");
        Ok(())
    });
}

#[test]
fn env_beats_explicit_file() {
    Jail::expect_with(|jail| {
        jail.create_file("extra.toml", "[execution]\nrow_cap = 11\n")?;
        jail.set_env("TELLR_EXECUTION__ROW_CAP", "13");

        let config = TellrConfig::load_from(Some(std::path::Path::new("extra.toml")))
            .expect("config loads");
        assert_eq!(config.execution.row_cap, 13);
        Ok(())
    });
}

#[test]
fn dotenv_file_is_read_but_does_not_override_env() {
    Jail::expect_with(|jail| {
        jail.create_file(
            ".env",
            "TELLR_LLM__BASE_URL=http://localhost:11434/v1\nTELLR_CLARIFICATION__MAX_ROUNDS=9\n",
        )?;
        jail.set_env("TELLR_CLARIFICATION__MAX_ROUNDS", "2");

        let config = TellrConfig::load_with_dotenv(None).expect("config loads");
        assert_eq!(config.llm.base_url, "http://localhost:11434/v1");
        assert_eq!(config.clarification.max_rounds, 2);
        Ok(())
    });
}
