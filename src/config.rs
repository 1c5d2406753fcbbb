//! Application configuration.
//!
//! Configuration is loaded from a TOML file at:
//! 1. an explicit path (the `--config` flag)
//! 2. `$MAILSIFT_CONFIG` (environment variable)
//! 3. `~/.config/mailsift/config.toml` (Linux), the platform config dir elsewhere
//! 4. Built-in defaults

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Message store location.
    pub storage: StorageConfig,
    /// Paging and caching of searches.
    pub search: SearchConfig,
    /// Zero-result suggestions.
    pub suggestions: SuggestionConfig,
    /// Log output.
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite database path. `None` uses `~/.mailsift/mailsift.db`.
    pub database_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Page size when the caller passes `limit = 0`.
    pub default_limit: usize,
    /// Upper bound on page size.
    pub max_limit: usize,
    /// Lifetime of cached first pages, in seconds. `0` disables the cache write.
    pub cache_ttl_secs: u64,
    /// Prefix for every cache key written by the search executor.
    pub cache_namespace: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SuggestionConfig {
    /// How many top senders and top subjects to inspect.
    pub pool_size: usize,
    /// Maximum number of suggestions returned.
    pub max_suggestions: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub level: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_limit: crate::search::filters::DEFAULT_LIMIT,
            max_limit: crate::search::filters::MAX_LIMIT,
            cache_ttl_secs: 30,
            cache_namespace: "email_search".to_string(),
        }
    }
}

impl SearchConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

impl Default for SuggestionConfig {
    fn default() -> Self {
        Self {
            pool_size: 10,
            max_suggestions: 5,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}

/// Why a config file could not be used.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file {} not found", .0.display())]
    NotFound(PathBuf),

    #[error("failed to read config file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Read configuration from `explicit`, or from the standard locations.
///
/// `Ok(None)` means no file exists at an implicit location. An explicit
/// path that does not exist is an error.
pub fn read_config(explicit: Option<&Path>) -> Result<Option<(Config, PathBuf)>, ConfigError> {
    let Some(path) = explicit.map(Path::to_path_buf).or_else(config_file_path) else {
        return Ok(None);
    };
    if !path.exists() {
        return match explicit {
            Some(_) => Err(ConfigError::NotFound(path)),
            None => Ok(None),
        };
    }

    let contents = match std::fs::read_to_string(&path) {
        Ok(contents) => contents,
        Err(source) => return Err(ConfigError::Read { path, source }),
    };
    match toml::from_str::<Config>(&contents) {
        Ok(cfg) => Ok(Some((cfg, path))),
        Err(source) => Err(ConfigError::Parse { path, source }),
    }
}

/// Load configuration, logging any problem and falling back to defaults.
pub fn load_config(explicit: Option<&Path>) -> Config {
    match read_config(explicit) {
        Ok(Some((cfg, path))) => {
            tracing::info!(path = %path.display(), "Loaded config");
            cfg
        }
        Ok(None) => Config::default(),
        Err(e) => {
            tracing::warn!(error = %e, "Unusable config, using defaults");
            Config::default()
        }
    }
}

/// Determine the config file path (checking env var first, then standard dirs).
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(env_path) = std::env::var("MAILSIFT_CONFIG") {
        return Some(PathBuf::from(env_path));
    }
    dirs::config_dir().map(|d| d.join("mailsift").join("config.toml"))
}
