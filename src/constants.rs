//! Application constants for the HTTP response cache
//!
//! This module centralizes all constants used throughout the crate,
//! organized by functional domain.

use std::time::Duration;

/// On-disk layout of cache entries
pub mod files {
    /// Suffix of the header record file
    pub const HEADER_SUFFIX: &str = ".hdr";

    /// Suffix of the body blob file
    pub const BODY_SUFFIX: &str = ".bdy";

    /// Suffix of a header record still being written
    pub const HEADER_TEMP_SUFFIX: &str = ".hdr.tmp";

    /// Reserved header name standing in for the absent-name status line
    pub const STATUS_LINE_TOKEN: &str = "null";

    /// Separator between header name and value in the header record
    pub const HEADER_SEPARATOR: char = '=';

    /// Line terminator used when writing header records
    #[cfg(windows)]
    pub const LINE_TERMINATOR: &str = "\r\n";

    /// Line terminator used when writing header records
    #[cfg(not(windows))]
    pub const LINE_TERMINATOR: &str = "\n";

    /// Name of the application directory under the OS cache/config roots
    pub const APP_DIR_NAME: &str = "http-response-cache";

    /// Name of the configuration file
    pub const CONFIG_FILE_NAME: &str = "config.toml";
}

/// Cache sizing and eviction scheduling
pub mod cache {
    use super::Duration;

    /// Default budget in kilobytes (25 MiB)
    pub const DEFAULT_MAX_SIZE_KB: u64 = 25 * 1024;

    /// Multiplier from configured kilobytes to bytes
    pub const BYTES_PER_KB: u64 = 1024;

    /// Delay before the first eviction sweep after the cache opens
    pub const INITIAL_SWEEP_DELAY: Duration = Duration::from_secs(10);

    /// Fixed delay between eviction sweeps
    pub const SWEEP_PERIOD: Duration = Duration::from_secs(60);

    /// Age after which a leftover header temp file is removed
    pub const STALE_TEMP_AGE: Duration = Duration::from_secs(60);

    /// Chunks buffered between the network stream and the body writer
    pub const WRITE_CHANNEL_CAPACITY: usize = 16;
}

/// HTTP header names and directives the cache inspects
pub mod headers {
    pub const CACHE_CONTROL: &str = "cache-control";
    pub const CONTENT_LENGTH: &str = "content-length";
    pub const CONTENT_ENCODING: &str = "content-encoding";
    pub const TRANSFER_ENCODING: &str = "transfer-encoding";

    /// Value of `transfer-encoding` that is never persisted
    pub const CHUNKED: &str = "chunked";

    /// Value of `content-encoding` that `open_stream` decompresses
    pub const GZIP: &str = "gzip";

    /// `cache-control` directives that forbid storing a response
    pub const NOT_CACHEABLE_DIRECTIVES: [&str; 4] =
        ["no-cache", "no-store", "must-revalidate", "max-age=0"];
}

/// Content-type exclusion
pub mod exclusion {
    /// Video container extensions excluded when media exclusion is enabled
    pub const VIDEO_EXTENSIONS: [&str; 5] = ["mkv", "webm", "3gp", "mp4", "ts"];
}

/// HTTP client configuration constants
pub mod http {
    use super::Duration;

    /// Default user agent for all HTTP requests
    pub const USER_AGENT: &str = "http-response-cache/0.1.0";

    /// Default HTTP request timeout
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

    /// Connection establishment timeout
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

    /// Maximum number of redirects to follow
    pub const MAX_REDIRECTS: usize = 10;
}

// Re-export commonly used constants at the top level for convenience
pub use cache::{DEFAULT_MAX_SIZE_KB, INITIAL_SWEEP_DELAY, SWEEP_PERIOD};
pub use http::USER_AGENT;
