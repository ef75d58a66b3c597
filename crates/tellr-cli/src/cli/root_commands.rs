use std::path::PathBuf;

use clap::{Args, Subcommand};

/// Top-level command tree.
#[derive(Clone, Debug, Subcommand)]
pub enum Commands {
    /// Ask one question and print the answer.
    Ask(AskArgs),
    /// Converse on stdin. `:clear` forgets the conversation, `:quit` exits.
    Chat(ChatArgs),
    /// Print the loaded database schema.
    Schema,
    /// Create the demo banking database.
    #[command(name = "init-db")]
    InitDb(InitDbArgs),
    /// Replay a scenario corpus and report the pass rate.
    Harness(HarnessArgs),
}

/// Arguments for `tellr ask`.
#[derive(Clone, Debug, Args)]
pub struct AskArgs {
    /// The question, in plain language.
    #[arg(required = true, num_args = 1..)]
    pub question: Vec<String>,
    /// Session to continue (defaults to a fresh one).
    #[arg(long)]
    pub session: Option<String>,
}

impl AskArgs {
    #[must_use]
    pub fn question_text(&self) -> String {
        self.question.join(" ")
    }
}

/// Arguments for `tellr chat`.
#[derive(Clone, Debug, Args)]
pub struct ChatArgs {
    #[arg(long)]
    pub session: Option<String>,
}

/// Arguments for `tellr init-db`.
#[derive(Clone, Debug, Args)]
pub struct InitDbArgs {
    /// Replace an existing database file.
    #[arg(long)]
    pub force: bool,
}

/// Arguments for `tellr harness`.
#[derive(Clone, Debug, Args)]
pub struct HarnessArgs {
    /// JSON Lines scenario corpus.
    pub scenarios: PathBuf,
    /// Scenarios in flight at once (defaults to `harness.concurrency`).
    #[arg(long)]
    pub concurrency: Option<usize>,
    /// Also write the report as JSON to this path.
    #[arg(long)]
    pub output: Option<PathBuf>,
    /// Exit with status 1 when the pass rate (percent) is below this.
    #[arg(long, default_value_t = 0.0)]
    pub min_pass_rate: f64,
}
