//! Command-line argument parsing for ShopTalk
//!
//! Provides clap-based CLI with subcommands and verbosity control.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// ShopTalk - Ask for products in plain language
#[derive(Parser, Debug)]
#[command(name = "shoptalk")]
#[command(version)]
#[command(about = "Turn a free-text shopping query into ranked products and an answer", long_about = None)]
pub struct Args {
    /// Configuration file path (default: ~/.shoptalk/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbosity level: -q (quiet), default (normal), -v (verbose), -vv (very verbose)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (errors only)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Subcommand
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Answer a shopping query
    Ask {
        /// The query, e.g. "red running shoes under $100"
        #[arg(value_name = "QUERY")]
        query: String,

        /// Number of products to return (default from config)
        #[arg(short, long)]
        k: Option<usize>,

        /// Print the full response as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check vector store and LLM reachability
    Health,

    /// Display current configuration
    Config {
        /// Write a default config file to the config path
        #[arg(long)]
        init: bool,
    },
}

/// Verbosity level enum
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    Quiet,
    Normal,
    Verbose,
    VeryVerbose,
}

impl Args {
    /// Get verbosity level based on flags
    pub fn verbosity(&self) -> Verbosity {
        if self.quiet {
            Verbosity::Quiet
        } else {
            match self.verbose {
                0 => Verbosity::Normal,
                1 => Verbosity::Verbose,
                _ => Verbosity::VeryVerbose,
            }
        }
    }
}

impl Verbosity {
    /// Default tracing directive; `RUST_LOG` overrides it
    pub fn directive(&self) -> &'static str {
        match self {
            Verbosity::Quiet => "error",
            Verbosity::Normal => "warn",
            Verbosity::Verbose => "shoptalk=info",
            Verbosity::VeryVerbose => "shoptalk=debug",
        }
    }

    /// Check if diagnostics should be printed with the answer
    pub fn show_diagnostics(&self) -> bool {
        matches!(self, Verbosity::Verbose | Verbosity::VeryVerbose)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ask() {
        let args = Args::parse_from(["shoptalk", "ask", "red running shoes under $100", "-k", "5"]);
        assert_eq!(args.verbosity(), Verbosity::Normal);
        match args.command {
            Commands::Ask { query, k, json } => {
                assert_eq!(query, "red running shoes under $100");
                assert_eq!(k, Some(5));
                assert!(!json);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let args = Args::parse_from(["shoptalk", "health", "-vv", "--config", "/tmp/c.toml"]);
        assert!(matches!(args.command, Commands::Health));
        assert_eq!(args.verbosity(), Verbosity::VeryVerbose);
        assert_eq!(args.config, Some(PathBuf::from("/tmp/c.toml")));
    }

    #[test]
    fn test_quiet_wins() {
        let args = Args::parse_from(["shoptalk", "-q", "-v", "config"]);
        assert_eq!(args.verbosity(), Verbosity::Quiet);
        assert_eq!(args.verbosity().directive(), "error");
    }

    #[test]
    fn test_config_init_flag() {
        let args = Args::parse_from(["shoptalk", "config", "--init"]);
        assert!(matches!(args.command, Commands::Config { init: true }));
    }

    #[test]
    fn test_query_required() {
        assert!(Args::try_parse_from(["shoptalk", "ask"]).is_err());
    }
}
