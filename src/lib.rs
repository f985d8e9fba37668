//! HTTP Response Cache Library
//!
//! A disk-backed cache for HTTP responses. Each response is stored as a
//! header file and a body file named by a hash of the request URI, and a
//! background sweeper keeps the directory within a size budget by evicting
//! the least recently accessed entries.

pub mod app;
pub mod cli;
pub mod config;
pub mod constants;
pub mod errors;
pub mod prelude;

// Re-export commonly used types for convenience
pub use errors::{AppError, Result};
