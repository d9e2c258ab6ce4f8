//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and `ROLLUP_*` environment variable overrides.

use crate::aggregation::{AggregationError, AggregationKind, BucketAggregation};
use crate::cache::DEFAULT_BLOCK_WIDTH;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub aggregation: AggregationConfig,

    #[serde(default)]
    pub query: QueryConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Default aggregation applied by the CLI
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregationConfig {
    #[serde(default = "default_kind")]
    pub kind: AggregationKind,

    #[serde(default = "default_sampling")]
    pub sampling_ms: i64,

    /// Window length; defaults to the sampling size
    #[serde(default)]
    pub extent_ms: Option<i64>,
}

fn default_kind() -> AggregationKind {
    AggregationKind::Sum
}

fn default_sampling() -> i64 {
    60_000 // 1 minute
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            kind: default_kind(),
            sampling_ms: default_sampling(),
            extent_ms: None,
        }
    }
}

/// Cluster query configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryConfig {
    #[serde(default = "default_shard_timeout")]
    pub shard_timeout_ms: u64,

    #[serde(default)]
    pub group_by: Vec<String>,
}

fn default_shard_timeout() -> u64 {
    30_000 // 30 seconds
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            shard_timeout_ms: default_shard_timeout(),
            group_by: Vec::new(),
        }
    }
}

/// Aggregation cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_block_width")]
    pub block_width: i64,
}

fn default_block_width() -> i64 {
    DEFAULT_BLOCK_WIDTH
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            block_width: default_block_width(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Config::default();
        config.apply_overrides(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_overrides(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// Load from default locations or environment
    pub fn load_default() -> Result<Self, ConfigError> {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("rollup").join("config.toml")),
            Some(PathBuf::from("/etc/rollup/config.toml")),
            Some(PathBuf::from("./rollup.toml")),
        ];

        for path in config_paths.iter().flatten() {
            if path.exists() {
                match Self::load_with_env(path) {
                    Ok(config) => {
                        tracing::info!("Loaded config from {:?}", path);
                        return Ok(config);
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path, e);
                    }
                }
            }
        }

        tracing::debug!("Using default config with environment overrides");
        Self::from_env()
    }

    /// Apply overrides from a variable lookup (the process environment in practice)
    fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Aggregation overrides
        if let Some(kind) = lookup("ROLLUP_AGGREGATION") {
            self.aggregation.kind = kind.parse().map_err(|_| ConfigError::Env {
                name: "ROLLUP_AGGREGATION",
                value: kind,
            })?;
        }
        if let Some(sampling) = lookup("ROLLUP_SAMPLING_MS") {
            self.aggregation.sampling_ms = parse_env("ROLLUP_SAMPLING_MS", sampling)?;
        }
        if let Some(extent) = lookup("ROLLUP_EXTENT_MS") {
            self.aggregation.extent_ms = Some(parse_env("ROLLUP_EXTENT_MS", extent)?);
        }

        // Query overrides
        if let Some(timeout) = lookup("ROLLUP_SHARD_TIMEOUT_MS") {
            self.query.shard_timeout_ms = parse_env("ROLLUP_SHARD_TIMEOUT_MS", timeout)?;
        }
        if let Some(group_by) = lookup("ROLLUP_GROUP_BY") {
            self.query.group_by = group_by
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }

        // Cache overrides
        if let Some(enabled) = lookup("ROLLUP_CACHE_ENABLED") {
            self.cache.enabled = parse_env("ROLLUP_CACHE_ENABLED", enabled)?;
        }
        if let Some(width) = lookup("ROLLUP_CACHE_BLOCK_WIDTH") {
            self.cache.block_width = parse_env("ROLLUP_CACHE_BLOCK_WIDTH", width)?;
        }

        // Logging overrides
        if let Some(level) = lookup("ROLLUP_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = lookup("ROLLUP_LOG_FORMAT") {
            self.logging.format = format;
        }

        Ok(())
    }

    /// Validated aggregation from the `[aggregation]` section
    pub fn aggregation(&self) -> Result<BucketAggregation, AggregationError> {
        let extent = self.aggregation.extent_ms.unwrap_or(self.aggregation.sampling_ms);
        BucketAggregation::new(self.aggregation.kind, self.aggregation.sampling_ms, extent)
    }

    /// Query runner settings from the `[query]` section
    pub fn runner_config(&self) -> crate::cluster::QueryConfig {
        crate::cluster::QueryConfig {
            shard_timeout: Duration::from_millis(self.query.shard_timeout_ms),
        }
    }

    /// Render as TOML
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))
    }
}

fn parse_env<T: std::str::FromStr>(name: &'static str, value: String) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::Env { name, value })
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },

    #[error("Invalid value for {name}: {value:?}")]
    Env { name: &'static str, value: String },

    #[error("Failed to serialize config: {0}")]
    Serialize(String),
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# Rollup Configuration
#
# Environment variables override these settings:
# - ROLLUP_AGGREGATION
# - ROLLUP_SAMPLING_MS
# - ROLLUP_EXTENT_MS
# - ROLLUP_SHARD_TIMEOUT_MS
# - ROLLUP_GROUP_BY (comma-separated)
# - ROLLUP_CACHE_ENABLED
# - ROLLUP_CACHE_BLOCK_WIDTH
# - ROLLUP_LOG_LEVEL
# - ROLLUP_LOG_FORMAT

[aggregation]
# Aggregation: sum, count, min, max
kind = "sum"

# Bucket spacing (ms)
sampling_ms = 60000

# Window length per bucket (ms); defaults to sampling_ms
# extent_ms = 120000

[query]
# Per-shard fetch timeout (ms)
shard_timeout_ms = 30000

# Tags that form the output group key; empty aggregates everything together
group_by = []

[cache]
# Lay complete results of aligned open-start queries out in cache blocks
enabled = false

# Samples per cached block
block_width = 1200

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"
"#
    .to_string()
}
