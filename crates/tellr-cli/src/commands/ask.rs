use tellr_config::TellrConfig;
use tellr_core::ids::new_session_id;

use crate::bootstrap;
use crate::cli::GlobalFlags;
use crate::cli::root_commands::AskArgs;
use crate::output;

/// Handle `tellr ask`.
pub async fn handle(
    args: &AskArgs,
    config: &TellrConfig,
    flags: &GlobalFlags,
) -> anyhow::Result<()> {
    let pipeline = bootstrap::build_pipeline(config).await?;
    let session_id = args.session.clone().unwrap_or_else(new_session_id);

    match pipeline.ask(&session_id, &args.question_text()).await {
        Ok(outcome) => {
            println!("{}", output::render_outcome(&outcome, flags.format)?);
            Ok(())
        }
        Err(error) => {
            tracing::debug!(?error, "ask failed");
            anyhow::bail!(error.user_message())
        }
    }
}
