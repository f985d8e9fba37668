//! HTTP response cache CLI application
//!
//! Command-line interface for fetching URLs through the disk cache and
//! maintaining the cache directory.

use std::process;

use anyhow::Context;
use tracing::{debug, info};
use tracing_subscriber::filter::{Directive, LevelFilter};
use tracing_subscriber::{fmt, EnvFilter};

use http_response_cache::cli::{handle_command, resolve_cache_config, Cli};
use http_response_cache::config::AppConfig;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

/// Main application logic
async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse_args();

    let app_config = AppConfig::load(cli.global.config.clone())
        .context("Failed to load configuration")?;

    init_logging(&cli, &app_config);
    info!("http_response_cache v{} starting", env!("CARGO_PKG_VERSION"));

    let cache_config = resolve_cache_config(&cli.global, &app_config);
    debug!("Cache configuration: {:?}", cache_config);

    handle_command(cli.command, cache_config, cli.global.quiet)
        .await
        .context("Command failed")
}

/// Initialize logging from CLI verbosity, falling back to the config file
fn init_logging(cli: &Cli, app_config: &AppConfig) {
    let level = cli
        .log_level()
        .map(|level| level.to_string().to_lowercase())
        .unwrap_or_else(|| app_config.logging.level.clone());

    let directive: Directive = format!("http_response_cache={}", level)
        .parse()
        .unwrap_or_else(|_| LevelFilter::WARN.into());

    let filter = EnvFilter::from_default_env().add_directive(directive);

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(cli.global.very_verbose)
        .with_writer(std::io::stderr)
        .init();

    if cli.global.very_verbose {
        info!("Very verbose logging enabled");
    } else if cli.global.verbose {
        info!("Verbose logging enabled");
    }
}
