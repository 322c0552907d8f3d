//! Command-line argument parsing.
//!
//! Defines the CLI structure using clap derive macros. Everything beyond
//! these few switches comes from the environment (see `Settings`).

use clap::{Parser, Subcommand};

/// docdex: hybrid documentation retrieval over MCP.
///
/// `index` ingests a product corpus into the vector store; `serve` runs
/// the online MCP endpoints.
#[derive(Parser, Debug)]
#[command(name = "docdex")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Ingest a product corpus into the vector store.
    ///
    /// Resumes from the product checkpoint when one exists; a clean run
    /// removes it.
    Index {
        /// Product id to index. Defaults to every id in `PRODUCT`.
        #[arg(short, long)]
        product: Option<String>,

        /// Language variant to index. Defaults to `DOC_LANG`.
        #[arg(short, long)]
        lang: Option<String>,

        /// Drop and recreate the collection before indexing.
        #[arg(short, long)]
        force: bool,
    },

    /// Serve the per-product MCP endpoints over HTTP.
    Serve,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_index() {
        let cli = Cli::try_parse_from(["docdex", "index", "--product", "spreadjs", "--force"])
            .unwrap();
        match cli.command {
            Commands::Index {
                product,
                lang,
                force,
            } => {
                assert_eq!(product.as_deref(), Some("spreadjs"));
                assert!(lang.is_none());
                assert!(force);
            }
            Commands::Serve => panic!("expected index"),
        }
    }

    #[test]
    fn test_parse_serve() {
        let cli = Cli::try_parse_from(["docdex", "serve"]).unwrap();
        assert!(matches!(cli.command, Commands::Serve));
    }

    #[test]
    fn test_unknown_subcommand_rejected() {
        assert!(Cli::try_parse_from(["docdex", "repl"]).is_err());
    }
}
