//! CLI command definitions and parsing
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "regdoc",
    version,
    about = "Hybrid retrieval over regulatory documents for grounded question answering",
    long_about = "Regdoc indexes extracted document pages into per-document collections and \
                  retrieves the passages most relevant to a question by fusing the store's own \
                  ranking with a dense re-embedding of the whole document."
)]
pub struct Cli {
    /// Global config file path (defaults to ~/.config/regdoc/config.toml)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Profile to apply on top of the config file
    #[arg(short, long, global = true)]
    pub profile: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Index a document's extracted pages into a collection
    Index {
        /// Page file: JSON array of {text, page_number} or form-feed separated text
        file: PathBuf,

        /// Collection name (derived from the file name by default)
        #[arg(short, long)]
        name: Option<String>,

        /// Replace the collection if it already exists
        #[arg(long)]
        replace: bool,
    },

    /// Retrieve the passages most relevant to a query
    Query {
        /// Query text
        query: String,

        /// Collection to search
        #[arg(short = 'C', long)]
        collection: String,

        /// Maximum number of passages (defaults to retrieval.default_k)
        #[arg(short)]
        k: Option<usize>,

        /// Show results in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Print the prompt context assembled for a query
    Context {
        /// Query text
        query: String,

        /// Collection to search
        #[arg(short = 'C', long)]
        collection: String,

        /// Retrieve as many passages as the document has
        #[arg(long)]
        whole_document: bool,
    },

    /// List collections in the store
    Collections,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Validate configuration file
    Validate {
        /// Path to config file (defaults to standard location)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Initialize default configuration
    Init {
        /// Force overwrite existing config
        #[arg(short, long)]
        force: bool,
    },
}

impl Cli {
    /// Parse CLI arguments from command line
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_query() {
        let cli = Cli::try_parse_from([
            "regdoc",
            "query",
            "capital buffers",
            "--collection",
            "rekomendacja_p",
            "-k",
            "3",
            "--json",
        ])
        .unwrap();

        match cli.command {
            Commands::Query {
                query,
                collection,
                k,
                json,
            } => {
                assert_eq!(query, "capital buffers");
                assert_eq!(collection, "rekomendacja_p");
                assert_eq!(k, Some(3));
                assert!(json);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["regdoc", "collections", "-v", "--profile", "strict"]).unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.profile.as_deref(), Some("strict"));
    }
}
