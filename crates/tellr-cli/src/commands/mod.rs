use tellr_config::TellrConfig;

use crate::cli::{Commands, GlobalFlags};

pub mod ask;
pub mod chat;
pub mod harness;
pub mod init_db;
pub mod schema;

/// Dispatch a parsed command to the corresponding handler module.
pub async fn dispatch(
    command: Commands,
    config: &TellrConfig,
    flags: &GlobalFlags,
) -> anyhow::Result<()> {
    match command {
        Commands::Ask(args) => ask::handle(&args, config, flags).await,
        Commands::Chat(args) => chat::handle(&args, config, flags).await,
        Commands::Schema => schema::handle(config, flags).await,
        Commands::InitDb(args) => init_db::handle(&args, config, flags).await,
        Commands::Harness(args) => harness::handle(&args, config, flags).await,
    }
}
