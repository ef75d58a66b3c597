use std::path::Path;

use anyhow::Context;
use serde::Serialize;
use tellr_config::TellrConfig;
use tellr_db::init_database;

use crate::cli::GlobalFlags;
use crate::cli::root_commands::InitDbArgs;
use crate::output;

#[derive(Serialize)]
struct SeededTable {
    table: String,
    rows: u64,
}

/// Handle `tellr init-db`.
pub async fn handle(
    args: &InitDbArgs,
    config: &TellrConfig,
    flags: &GlobalFlags,
) -> anyhow::Result<()> {
    let path = Path::new(&config.database.path);
    let counts = init_database(path, args.force)
        .await
        .with_context(|| format!("failed to initialize {}", path.display()))?;

    if !flags.quiet {
        eprintln!("Created {}", path.display());
    }
    let seeded = counts
        .into_iter()
        .map(|count| SeededTable {
            table: count.table,
            rows: count.rows,
        })
        .collect::<Vec<_>>();
    output::output(&seeded, flags.format)
}
