use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use tellr_config::TellrConfig;
use tellr_db::ExecutionEngine;
use tellr_llm::ChatCompletionsClient;
use tellr_pipeline::Pipeline;
use tellr_schema::{SchemaRegistry, SchemaSource};

use crate::cli::GlobalFlags;

/// Load `.env` from the working directory, then the layered configuration.
pub fn load_config(flags: &GlobalFlags) -> anyhow::Result<TellrConfig> {
    TellrConfig::load_with_dotenv(flags.config.as_deref()).map_err(anyhow::Error::from)
}

/// Build the live pipeline: hosted model, schema from the database, engine.
pub async fn build_pipeline(config: &TellrConfig) -> anyhow::Result<Pipeline> {
    let llm = config
        .require_llm()
        .context("set GROQ_API_KEY or TELLR_LLM__API_KEY to ask questions")?;
    let model = Arc::new(ChatCompletionsClient::new(llm));

    let db_path = Path::new(&config.database.path);
    let registry = load_registry(db_path).await?;
    let engine = ExecutionEngine::open(db_path, &config.execution)
        .await
        .with_context(|| format!("failed to open database {}", db_path.display()))?;

    tracing::info!(
        model = %llm.model,
        tables = registry.describe().table_count(),
        "pipeline ready"
    );
    Ok(Pipeline::new(model, registry.snapshot(), engine, config))
}

/// Load the schema from the database and install it process-wide.
pub async fn load_registry(db_path: &Path) -> anyhow::Result<&'static SchemaRegistry> {
    if let Some(registry) = SchemaRegistry::global() {
        return Ok(registry);
    }
    let registry = SchemaRegistry::load(&SchemaSource::Database(db_path.to_path_buf()))
        .await
        .with_context(|| {
            format!(
                "failed to load schema from {} (run 'tellr init-db' to create it)",
                db_path.display()
            )
        })?;
    registry.install().context("failed to install schema registry")
}
