use std::sync::Arc;

use anyhow::Context;
use tellr_config::TellrConfig;
use tellr_harness::{Harness, load_scenarios};

use crate::bootstrap;
use crate::cli::GlobalFlags;
use crate::cli::root_commands::HarnessArgs;
use crate::output;

/// Handle `tellr harness`.
pub async fn handle(
    args: &HarnessArgs,
    config: &TellrConfig,
    flags: &GlobalFlags,
) -> anyhow::Result<()> {
    let scenarios = load_scenarios(&args.scenarios)?;
    let pipeline = bootstrap::build_pipeline(config).await?;

    let tables = pipeline
        .engine()
        .list_tables()
        .await
        .context("database connectivity check failed")?;
    if tables.is_empty() {
        anyhow::bail!(
            "database {} has no tables (run 'tellr init-db')",
            pipeline.engine().path().display()
        );
    }
    tracing::info!(tables = tables.len(), "database reachable");

    let concurrency = args.concurrency.unwrap_or(config.harness.concurrency);
    let report = Harness::new(Arc::new(pipeline), concurrency)
        .run(scenarios)
        .await;

    println!("{}", output::render_report(&report, flags.format)?);
    if let Some(path) = &args.output {
        report.write_json(path)?;
        if !flags.quiet {
            eprintln!("Report written to {}", path.display());
        }
    }

    if !report.meets(args.min_pass_rate) {
        anyhow::bail!(
            "pass rate {:.1}% is below the required {:.1}%",
            report.pass_rate,
            args.min_pass_rate
        );
    }
    Ok(())
}
