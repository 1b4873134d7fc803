pub mod onboard;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "timelog",
    about = "Daily activity report ingestion and search"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    Onboard,
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    Status,
    Doctor,
    /// Fetch, normalize and store the newest daily reports.
    Ingest {
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Print the record extracted from a single message file.
    Parse { path: PathBuf },
    Search {
        query: String,
        #[arg(long, default_value_t = 5)]
        limit: usize,
    },
    Embedding {
        #[command(subcommand)]
        command: EmbeddingCommands,
    },
    Service,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    Set { key: String, value: String },
    Get { key: String },
}

#[derive(Debug, Subcommand)]
pub enum EmbeddingCommands {
    Test {
        #[arg(long)]
        key: Option<String>,
        #[arg(long)]
        base_url: Option<String>,
        #[arg(long)]
        model: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::{Cli, Commands, EmbeddingCommands};
    use clap::Parser;

    #[test]
    fn parses_ingest_and_search_arguments() {
        let cli = Cli::try_parse_from(["timelog", "ingest", "--limit", "3"]).expect("ingest");
        assert!(matches!(cli.command, Commands::Ingest { limit: Some(3) }));

        let cli = Cli::try_parse_from(["timelog", "search", "deep work"]).expect("search");
        assert!(matches!(
            cli.command,
            Commands::Search { ref query, limit: 5 } if query == "deep work"
        ));
    }

    #[test]
    fn parses_embedding_test_overrides() {
        let cli = Cli::try_parse_from([
            "timelog",
            "embedding",
            "test",
            "--base-url",
            "http://localhost:8080/v1",
        ])
        .expect("embedding test");

        match cli.command {
            Commands::Embedding {
                command: EmbeddingCommands::Test { base_url, key, .. },
            } => {
                assert_eq!(base_url.as_deref(), Some("http://localhost:8080/v1"));
                assert!(key.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
