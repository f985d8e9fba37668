//! Error types for the HTTP response cache
//!
//! Errors are grouped by the component that raises them. Cache errors never
//! reach the network path: the facade turns them into a miss or a declined
//! store and logs the reason. The other groups belong to the command line
//! tool and the fetch collaborator.

use std::path::PathBuf;
use thiserror::Error;

/// Cache engine errors
#[derive(Error, Debug)]
pub enum CacheError {
    /// No entry stored under the key; a normal miss
    #[error("No cache entry for key {key}")]
    NotFound { key: String },

    /// Response headers, content type or storage state forbid caching
    #[error("Response is not cacheable: {reason}")]
    NotCacheable { reason: String },

    /// Store declined by the admission checks
    #[error("Cache admission rejected: {reason}")]
    AdmissionRejected { reason: String },

    /// Body length did not match the declared length at finalize time
    #[error("Incomplete cache write: expected {expected} bytes, got {actual} bytes")]
    CorruptOrIncomplete { expected: u64, actual: u64 },

    /// Cache directory missing or unusable
    #[error("Cache directory not accessible: {path}")]
    DirectoryNotAccessible { path: PathBuf },

    /// I/O error on an entry file
    #[error("Cache I/O error")]
    Io(#[from] std::io::Error),
}

/// Network collaborator errors
#[derive(Error, Debug)]
pub enum FetchError {
    /// HTTP request error
    #[error("HTTP request failed")]
    Http(#[from] reqwest::Error),

    /// Server returned error status
    #[error("Server error: HTTP {status}")]
    ServerError { status: u16 },

    /// Invalid URL provided
    #[error("Invalid URL: {url} - {error}")]
    InvalidUrl { url: String, error: String },

    /// I/O error while reading a cached body or writing output
    #[error("File I/O error")]
    Io(#[from] std::io::Error),
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    NotFound { path: PathBuf },

    /// Invalid configuration format
    #[error("Invalid configuration format")]
    InvalidFormat(#[from] toml::de::Error),

    /// Invalid configuration value
    #[error("Invalid configuration value for {field}: {value}. {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Top-level application error that can represent any error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Cache error
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// Fetch error
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// Configuration error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Generic I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Generic application error with context
    #[error("Application error: {message}")]
    Generic { message: String },
}

impl AppError {
    /// Create a generic application error with a message
    pub fn generic(message: impl Into<String>) -> Self {
        Self::Generic {
            message: message.into(),
        }
    }

    /// Check if the error is recoverable (transient)
    pub fn is_recoverable(&self) -> bool {
        match self {
            AppError::Fetch(FetchError::Http(_))
            | AppError::Fetch(FetchError::ServerError { .. })
            | AppError::Cache(CacheError::AdmissionRejected { .. })
            | AppError::Cache(CacheError::CorruptOrIncomplete { .. }) => true,

            AppError::Fetch(FetchError::InvalidUrl { .. })
            | AppError::Config(ConfigError::InvalidFormat(_)) => false,

            _ => false,
        }
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            AppError::Cache(_) => "cache",
            AppError::Fetch(_) => "fetch",
            AppError::Config(_) => "config",
            AppError::Io(_) => "io",
            AppError::Generic { .. } => "generic",
        }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, AppError>;

/// Cache result type alias
pub type CacheResult<T> = std::result::Result<T, CacheError>;

/// Fetch result type alias
pub type FetchResult<T> = std::result::Result<T, FetchError>;

/// Configuration result type alias
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
