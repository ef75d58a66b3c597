use std::io::Write;

use anyhow::Context;
use tellr_config::TellrConfig;
use tellr_core::ids::new_session_id;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::bootstrap;
use crate::cli::GlobalFlags;
use crate::cli::root_commands::ChatArgs;
use crate::output;

/// A line typed at the chat prompt.
#[derive(Debug, PartialEq, Eq)]
enum Line<'a> {
    Quit,
    Clear,
    Skip,
    Question(&'a str),
}

fn classify(line: &str) -> Line<'_> {
    match line.trim() {
        "" => Line::Skip,
        ":quit" | ":q" | ":exit" => Line::Quit,
        ":clear" => Line::Clear,
        question => Line::Question(question),
    }
}

fn prompt(quiet: bool) -> anyhow::Result<()> {
    if !quiet {
        print!("you> ");
        std::io::stdout().flush().context("failed to flush stdout")?;
    }
    Ok(())
}

/// Handle `tellr chat`.
pub async fn handle(
    args: &ChatArgs,
    config: &TellrConfig,
    flags: &GlobalFlags,
) -> anyhow::Result<()> {
    let pipeline = bootstrap::build_pipeline(config).await?;
    let session_id = args.session.clone().unwrap_or_else(new_session_id);
    if !flags.quiet {
        println!("Ask about customers, accounts, transactions, loans, employees or branches.");
        println!("Type :clear to start over and :quit to leave.");
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    prompt(flags.quiet)?;
    while let Some(line) = lines.next_line().await.context("failed to read stdin")? {
        match classify(&line) {
            Line::Quit => break,
            Line::Skip => {}
            Line::Clear => {
                pipeline.reset_session(&session_id).await;
                println!("Conversation cleared.");
            }
            Line::Question(question) => match pipeline.ask(&session_id, question).await {
                Ok(outcome) => println!("{}", output::render_outcome(&outcome, flags.format)?),
                Err(error) => {
                    tracing::debug!(?error, "question failed");
                    eprintln!("{}", error.user_message());
                }
            },
        }
        prompt(flags.quiet)?;
    }
    Ok(())
}
