//! Command handlers for the CLI
//!
//! Each handler opens its own cache instance from the resolved configuration.
//! Only `fetch` runs recovery and starts the background sweeper; the
//! maintenance commands work on the directory directly and exit, leaving
//! writes by other processes alone.

use std::fs::File;
use std::io::{self, Read, Write};
use std::path::Path;
use std::sync::Arc;

use flate2::read::GzDecoder;
use tracing::debug;
use url::Url;

use crate::app::cache::stats::format_bytes;
use crate::app::cache::{CacheConfig, ResponseCache};
use crate::app::client::{CachingClient, FetchedBody};
use crate::cli::{Commands, FetchArgs, GlobalArgs};
use crate::config::AppConfig;
use crate::constants::headers;
use crate::errors::{AppError, FetchError, Result};

/// Build the runtime cache configuration, applying command line overrides
pub fn resolve_cache_config(global: &GlobalArgs, app_config: &AppConfig) -> CacheConfig {
    let mut config = app_config.to_runtime_config();
    if let Some(dir) = &global.cache_dir {
        config.cache_root = Some(dir.clone());
    }
    if let Some(max_size_kb) = global.max_size_kb {
        config = config.with_max_size_kb(max_size_kb);
    }
    config
}

/// Dispatch a parsed command
pub async fn handle_command(command: Commands, config: CacheConfig, quiet: bool) -> Result<()> {
    match command {
        Commands::Fetch(args) => handle_fetch(args, config, quiet).await,
        Commands::Peek { url } => handle_peek(&url, config),
        Commands::Stats { json } => handle_stats(json, config),
        Commands::Sweep => handle_sweep(config),
        Commands::Clear => handle_clear(config),
    }
}

/// Handle the fetch command
pub async fn handle_fetch(args: FetchArgs, config: CacheConfig, quiet: bool) -> Result<()> {
    let url = parse_url(&args.url)?;
    let cache = ResponseCache::open(config).await?;
    let client = CachingClient::new(Arc::clone(&cache))?;

    let result = client.get(&url).await;
    cache.shutdown().await;
    let fetched = result?;

    let body = if args.decompress {
        decode_body(&fetched)?
    } else {
        fetched.bytes.clone()
    };

    match &args.output {
        Some(path) => write_output(path, &body)?,
        None => io::stdout().write_all(&body)?,
    }

    if !quiet {
        let source = if fetched.from_cache { "cache" } else { "network" };
        eprintln!("📥 {} ({}, from {})", url, format_bytes(body.len() as u64), source);
    }
    Ok(())
}

/// Handle the peek command
pub fn handle_peek(url: &str, config: CacheConfig) -> Result<()> {
    let url = parse_url(url)?;
    let cache = ResponseCache::new(config)?;

    if cache.peek(&url) {
        println!("✅ Cached: {}", url);
    } else {
        println!("❌ Not cached: {}", url);
    }
    Ok(())
}

/// Handle the stats command
pub fn handle_stats(json: bool, config: CacheConfig) -> Result<()> {
    let cache = ResponseCache::new(config)?;
    let stats = cache.stats()?;

    if json {
        let text = serde_json::to_string_pretty(&stats)
            .map_err(|e| AppError::generic(format!("Failed to serialize stats: {}", e)))?;
        println!("{}", text);
        return Ok(());
    }

    println!("💾 Cache Information");
    println!("===================");
    println!("Location: {}", stats.cache_root.display());
    println!("Entries: {}", stats.entry_count);
    println!(
        "Size: {} of {} ({:.1}%)",
        stats.format_total_size(),
        stats.format_budget(),
        stats.usage_percentage()
    );
    if let (Some(oldest), Some(newest)) = (stats.oldest_access, stats.newest_access) {
        println!("Oldest access: {}", oldest.format("%Y-%m-%d %H:%M:%S UTC"));
        println!("Newest access: {}", newest.format("%Y-%m-%d %H:%M:%S UTC"));
    }
    if !stats.in_flight.is_empty() {
        println!("In-flight writes: {}", stats.in_flight_writes);
        for write in &stats.in_flight {
            println!(
                "  {} ({} expected, since {})",
                write.uri,
                format_bytes(write.declared_len),
                write.claimed_at.format("%Y-%m-%d %H:%M:%S UTC")
            );
        }
    }
    if stats.is_over_budget() {
        println!("⚠️  Over budget; the next sweep will evict entries");
    }
    Ok(())
}

/// Handle the sweep command
pub fn handle_sweep(config: CacheConfig) -> Result<()> {
    let cache = ResponseCache::new(config)?;
    let report = cache.sweep_now()?;

    println!("🧹 Cache Sweep");
    println!("=============");
    println!("Entries scanned: {}", report.scanned);
    println!("Entries evicted: {}", report.evicted);
    println!("Freed: {}", format_bytes(report.freed_bytes));
    println!("Retained: {}", format_bytes(report.retained_bytes));
    Ok(())
}

/// Handle the clear command
pub fn handle_clear(config: CacheConfig) -> Result<()> {
    let cache = ResponseCache::new(config)?;
    let removed = cache.clear()?;

    println!("🗑️  Removed {} cache entries", removed);
    Ok(())
}

fn parse_url(raw: &str) -> Result<Url> {
    Url::parse(raw).map_err(|e| {
        AppError::Fetch(FetchError::InvalidUrl {
            url: raw.to_string(),
            error: e.to_string(),
        })
    })
}

/// Undo gzip content encoding; other encodings pass through unchanged
fn decode_body(fetched: &FetchedBody) -> Result<Vec<u8>> {
    let gzipped = fetched
        .headers
        .get(headers::CONTENT_ENCODING)
        .is_some_and(|v| v.eq_ignore_ascii_case(headers::GZIP));
    if !gzipped {
        debug!("Body is not gzip encoded, writing as is");
        return Ok(fetched.bytes.clone());
    }

    let mut decoded = Vec::new();
    GzDecoder::new(fetched.bytes.as_slice()).read_to_end(&mut decoded)?;
    Ok(decoded)
}

fn write_output(path: &Path, body: &[u8]) -> Result<()> {
    let mut file = File::create(path)?;
    file.write_all(body)?;
    file.sync_all()?;
    Ok(())
}
