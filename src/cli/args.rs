//! Command-line argument parsing
//!
//! This module defines the CLI structure using clap derive macros: fetching
//! through the cache, inspecting entries and maintaining the cache directory.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// HTTP response cache - fetch URLs through a bounded disk cache
#[derive(Parser, Debug)]
#[command(
    name = "http_response_cache",
    version,
    about = "Fetch HTTP resources through a size-bounded disk cache",
    long_about = "Fetches HTTP resources through a disk-backed response cache.
Responses are stored as header and body files and evicted least recently used first once the cache exceeds its budget."
)]
pub struct Cli {
    /// Global options
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Global arguments available to all subcommands
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Very verbose logging (debug level)
    #[arg(long, global = true)]
    pub very_verbose: bool,

    /// Quiet mode - suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Configuration file path
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Cache directory path
    #[arg(long, global = true, value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Cache budget in kilobytes
    #[arg(long, global = true, value_name = "KB")]
    pub max_size_kb: Option<u64>,
}

/// Available CLI commands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Fetch a URL, serving it from the cache when possible
    Fetch(FetchArgs),

    /// Check whether a URL has a complete cache entry
    Peek {
        /// URL to look up
        url: String,
    },

    /// Show cache statistics
    Stats {
        /// Print statistics as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run one eviction sweep now
    Sweep,

    /// Remove every cache entry
    Clear,
}

/// Arguments for the fetch command
#[derive(Args, Debug, Clone)]
pub struct FetchArgs {
    /// URL to fetch
    pub url: String,

    /// Write the body to a file instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Decode gzip content encoding before writing the body
    #[arg(long)]
    pub decompress: bool,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Get the logging level based on global arguments
    ///
    /// Returns `None` when no verbosity flag was given, leaving the choice to
    /// the configuration file.
    pub fn log_level(&self) -> Option<tracing::Level> {
        if self.global.quiet {
            Some(tracing::Level::ERROR)
        } else if self.global.very_verbose {
            Some(tracing::Level::DEBUG)
        } else if self.global.verbose {
            Some(tracing::Level::INFO)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(global: GlobalArgs) -> Cli {
        Cli {
            global,
            command: Commands::Sweep,
        }
    }

    #[test]
    fn test_log_level() {
        assert_eq!(cli(GlobalArgs::default()).log_level(), None);

        let quiet = cli(GlobalArgs {
            quiet: true,
            very_verbose: true,
            ..Default::default()
        });
        assert_eq!(quiet.log_level(), Some(tracing::Level::ERROR));

        let verbose = cli(GlobalArgs {
            verbose: true,
            ..Default::default()
        });
        assert_eq!(verbose.log_level(), Some(tracing::Level::INFO));

        let very_verbose = cli(GlobalArgs {
            verbose: true,
            very_verbose: true,
            ..Default::default()
        });
        assert_eq!(very_verbose.log_level(), Some(tracing::Level::DEBUG));
    }

    #[test]
    fn test_parse_fetch() {
        let cli = Cli::try_parse_from([
            "http_response_cache",
            "--max-size-kb",
            "64",
            "fetch",
            "http://example.com/a.json",
            "-o",
            "out.json",
            "--decompress",
        ])
        .unwrap();

        assert_eq!(cli.global.max_size_kb, Some(64));
        match cli.command {
            Commands::Fetch(args) => {
                assert_eq!(args.url, "http://example.com/a.json");
                assert_eq!(args.output, Some(PathBuf::from("out.json")));
                assert!(args.decompress);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_stats_json() {
        let cli = Cli::try_parse_from(["http_response_cache", "stats", "--json", "-q"]).unwrap();
        assert!(cli.global.quiet);
        assert!(matches!(cli.command, Commands::Stats { json: true }));
    }
}
