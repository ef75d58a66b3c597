use std::path::PathBuf;

use clap::Parser;

pub mod global;
pub mod root_commands;

pub use global::{GlobalFlags, OutputFormat};
pub use root_commands::Commands;

/// Top-level CLI parser for the `tellr` binary.
#[derive(Debug, Parser)]
#[command(name = "tellr", version, about = "tellr - ask your bank's data in plain language")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output format: json, table, raw
    #[arg(short, long, global = true, default_value = "table")]
    pub format: OutputFormat,

    /// Quiet mode (errors only)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose mode (debug logging)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Extra TOML configuration layered over the discovered files
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

impl Cli {
    /// Extract ergonomic global flags struct for command handlers.
    #[must_use]
    pub fn global_flags(&self) -> GlobalFlags {
        GlobalFlags {
            format: self.format,
            quiet: self.quiet,
            verbose: self.verbose,
            config: self.config.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use clap::{CommandFactory, Parser};

    use super::{Cli, Commands, OutputFormat};

    #[test]
    fn clap_command_tree_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn ask_joins_question_words() {
        let cli = Cli::try_parse_from([
            "tellr",
            "ask",
            "How",
            "many",
            "loans?",
            "--session",
            "abc",
        ])
        .expect("cli should parse");

        let Commands::Ask(args) = cli.command else {
            panic!("expected ask");
        };
        assert_eq!(args.question_text(), "How many loans?");
        assert_eq!(args.session.as_deref(), Some("abc"));
    }

    #[test]
    fn global_flags_parse_before_and_after_subcommand() {
        let cli = Cli::try_parse_from(["tellr", "--format", "json", "schema", "--verbose"])
            .expect("cli should parse");

        assert_eq!(cli.format, OutputFormat::Json);
        assert!(cli.verbose);
        assert!(matches!(cli.command, Commands::Schema));
    }

    #[test]
    fn output_format_rejects_invalid_value() {
        assert!(Cli::try_parse_from(["tellr", "--format", "xml", "schema"]).is_err());
    }

    #[test]
    fn harness_arguments() {
        let cli = Cli::try_parse_from([
            "tellr",
            "harness",
            "scenarios/banking.jsonl",
            "--concurrency",
            "8",
            "--min-pass-rate",
            "80",
            "--config",
            "/tmp/tellr.toml",
        ])
        .expect("cli should parse");

        assert_eq!(cli.global_flags().config.as_deref(), Some(Path::new("/tmp/tellr.toml")));
        let Commands::Harness(args) = cli.command else {
            panic!("expected harness");
        };
        assert_eq!(args.concurrency, Some(8));
        assert!((args.min_pass_rate - 80.0).abs() < f64::EPSILON);
        assert!(args.output.is_none());
    }

    #[test]
    fn init_db_defaults_to_no_force() {
        let cli = Cli::try_parse_from(["tellr", "init-db"]).expect("cli should parse");
        assert!(matches!(cli.command, Commands::InitDb(args) if !args.force));
    }

    #[test]
    fn ask_requires_a_question() {
        assert!(Cli::try_parse_from(["tellr", "ask"]).is_err());
    }
}
