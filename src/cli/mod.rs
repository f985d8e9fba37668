//! Command-line interface components
//!
//! Argument parsing and command handlers for the `http_response_cache`
//! binary.

pub mod args;
pub mod commands;

pub use args::{Cli, Commands, FetchArgs, GlobalArgs};
pub use commands::{
    handle_clear, handle_command, handle_fetch, handle_peek, handle_stats, handle_sweep,
    resolve_cache_config,
};
