use std::path::Path;

use tellr_config::TellrConfig;

use crate::bootstrap;
use crate::cli::GlobalFlags;
use crate::output;

/// Handle `tellr schema`.
pub async fn handle(config: &TellrConfig, flags: &GlobalFlags) -> anyhow::Result<()> {
    let registry = bootstrap::load_registry(Path::new(&config.database.path)).await?;
    println!("{}", output::render_schema(registry.describe(), flags.format)?);
    Ok(())
}
