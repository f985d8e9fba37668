//! Configuration file support
//!
//! The command line tool reads an optional TOML file with `[cache]` and
//! `[logging]` tables. A missing default file means built-in defaults; a
//! missing file named with `--config` is an error.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::app::cache::CacheConfig;
use crate::constants::{cache, files};
use crate::errors::{ConfigError, ConfigResult};

/// Application configuration as stored in TOML
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Response cache settings
    pub cache: CacheConfigToml,
    /// Logging settings
    pub logging: LoggingConfig,
}

/// TOML-friendly cache configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfigToml {
    /// Cache directory path (OS default when absent)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_root: Option<PathBuf>,
    /// Budget in kilobytes
    pub max_size_kb: u64,
    /// Delay before the first eviction sweep, e.g. "10s"
    #[serde(with = "humantime_serde")]
    pub initial_sweep_delay: Duration,
    /// Delay between eviction sweeps, e.g. "1m"
    #[serde(with = "humantime_serde")]
    pub sweep_period: Duration,
    /// Skip caching video containers
    pub exclude_media: bool,
}

impl Default for CacheConfigToml {
    fn default() -> Self {
        Self {
            cache_root: None,
            max_size_kb: cache::DEFAULT_MAX_SIZE_KB,
            initial_sweep_delay: cache::INITIAL_SWEEP_DELAY,
            sweep_period: cache::SWEEP_PERIOD,
            exclude_media: false,
        }
    }
}

impl CacheConfigToml {
    /// Convert to the runtime cache configuration
    pub fn to_runtime_config(&self) -> CacheConfig {
        CacheConfig {
            cache_root: self.cache_root.clone(),
            max_size_kb: self.max_size_kb,
            initial_sweep_delay: self.initial_sweep_delay,
            sweep_period: self.sweep_period,
            exclude_media: self.exclude_media,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level used when no verbosity flag is given
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}

impl AppConfig {
    /// Convert TOML-friendly configuration to runtime configuration
    pub fn to_runtime_config(&self) -> CacheConfig {
        self.cache.to_runtime_config()
    }

    /// Load configuration from `path`, or from the default location
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::NotFound` when an explicit path does not exist,
    /// and `ConfigError::InvalidFormat` when the file does not parse.
    pub fn load(path: Option<PathBuf>) -> ConfigResult<Self> {
        match path {
            Some(path) if !path.exists() => Err(ConfigError::NotFound { path }),
            Some(path) => Self::load_from_file(&path),
            None => match Self::default_config_path() {
                Some(path) if path.exists() => Self::load_from_file(&path),
                _ => {
                    debug!("No config file found, using defaults");
                    Ok(Self::default())
                }
            },
        }
    }

    /// Default config file path for the current user
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(files::APP_DIR_NAME).join(files::CONFIG_FILE_NAME))
    }

    fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|_| ConfigError::NotFound {
            path: path.to_path_buf(),
        })?;
        let config = Self::from_toml(&content)?;

        info!("Loaded configuration from: {}", path.display());
        Ok(config)
    }

    /// Parse and validate configuration text
    pub fn from_toml(content: &str) -> ConfigResult<Self> {
        let config: AppConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> ConfigResult<()> {
        if self.cache.sweep_period.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "cache.sweep_period".to_string(),
                value: "0s".to_string(),
                reason: "Sweep period must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}
