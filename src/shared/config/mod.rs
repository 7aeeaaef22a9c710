//! Pipeline configuration module
//!
//! Provides the configuration shared by the queue, the cache and the
//! inspection binary. Values come from defaults, a TOML document and
//! environment overrides, in that order.

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Durable key holding the serialized pending action queue
pub const DEFAULT_QUEUE_KEY: &str = "pendingActions";

/// Prefix namespacing cache entries in durable storage
pub const DEFAULT_CACHE_PREFIX: &str = "cache_";

/// Default cache time-to-live (5 minutes)
pub const DEFAULT_CACHE_TTL_MS: u64 = 300_000;

/// Environment variable overriding the database path
pub const ENV_DB_PATH: &str = "DASHSYNC_DB_PATH";

/// Environment variable overriding the default cache TTL
pub const ENV_CACHE_TTL_MS: &str = "DASHSYNC_CACHE_TTL_MS";

/// Pipeline configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// SQLite database file
    pub database_path: PathBuf,
    /// Durable key of the pending action queue
    pub queue_key: String,
    /// Durable key prefix for cache entries
    pub cache_prefix: String,
    /// TTL used by `ExpiringCache::set_default`
    pub default_cache_ttl: Duration,
    /// Connectivity assumed before the first platform signal
    pub assume_online: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            queue_key: DEFAULT_QUEUE_KEY.to_string(),
            cache_prefix: DEFAULT_CACHE_PREFIX.to_string(),
            default_cache_ttl: Duration::from_millis(DEFAULT_CACHE_TTL_MS),
            assume_online: true,
        }
    }
}

/// Platform data directory location of the local database
pub fn default_database_path() -> PathBuf {
    let mut path = dirs::data_dir().unwrap_or_else(std::env::temp_dir);
    path.push("dashsync");
    path.push("local.db");
    path
}

impl PipelineConfig {
    /// Create a new PipelineConfigBuilder
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::default()
    }

    /// Parse a TOML document; absent fields keep their defaults
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile =
            toml::from_str(input).map_err(|e| ConfigError::Parse(e.to_string()))?;
        file.into_builder().build()
    }

    /// Defaults with environment overrides applied
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::builder()
            .apply_env(|name| std::env::var(name).ok())?
            .build()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.queue_key.is_empty() {
            return Err(ConfigError::MissingValue("queue_key"));
        }
        if self.cache_prefix.is_empty() {
            return Err(ConfigError::MissingValue("cache_prefix"));
        }
        if self.queue_key.starts_with(&self.cache_prefix) {
            return Err(ConfigError::KeyCollision {
                queue_key: self.queue_key.clone(),
                cache_prefix: self.cache_prefix.clone(),
            });
        }
        if self.default_cache_ttl.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "default_cache_ttl_ms",
                message: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

/// Builder for PipelineConfig
#[derive(Debug, Default)]
pub struct PipelineConfigBuilder {
    database_path: Option<PathBuf>,
    queue_key: Option<String>,
    cache_prefix: Option<String>,
    default_cache_ttl: Option<Duration>,
    assume_online: Option<bool>,
}

impl PipelineConfigBuilder {
    /// Set the database path
    pub fn database_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.database_path = Some(path.into());
        self
    }

    /// Set the queue key
    pub fn queue_key(mut self, key: impl Into<String>) -> Self {
        self.queue_key = Some(key.into());
        self
    }

    /// Set the cache prefix
    pub fn cache_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.cache_prefix = Some(prefix.into());
        self
    }

    /// Set the default cache TTL
    pub fn default_cache_ttl(mut self, ttl: Duration) -> Self {
        self.default_cache_ttl = Some(ttl);
        self
    }

    /// Set the initial connectivity assumption
    pub fn assume_online(mut self, online: bool) -> Self {
        self.assume_online = Some(online);
        self
    }

    /// Apply overrides from an environment lookup
    pub fn apply_env<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup(ENV_DB_PATH) {
            self.database_path = Some(PathBuf::from(path));
        }
        if let Some(raw) = lookup(ENV_CACHE_TTL_MS) {
            let ms = raw.trim().parse::<u64>().map_err(|_| ConfigError::InvalidValue {
                field: "default_cache_ttl_ms",
                message: format!("'{}' is not a whole number of milliseconds", raw),
            })?;
            self.default_cache_ttl = Some(Duration::from_millis(ms));
        }
        Ok(self)
    }

    /// Build and validate the configuration
    pub fn build(self) -> Result<PipelineConfig, ConfigError> {
        let defaults = PipelineConfig::default();
        let config = PipelineConfig {
            database_path: self.database_path.unwrap_or(defaults.database_path),
            queue_key: self.queue_key.unwrap_or(defaults.queue_key),
            cache_prefix: self.cache_prefix.unwrap_or(defaults.cache_prefix),
            default_cache_ttl: self.default_cache_ttl.unwrap_or(defaults.default_cache_ttl),
            assume_online: self.assume_online.unwrap_or(defaults.assume_online),
        };
        config.validate()?;
        Ok(config)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    database_path: Option<PathBuf>,
    queue_key: Option<String>,
    cache_prefix: Option<String>,
    default_cache_ttl_ms: Option<u64>,
    assume_online: Option<bool>,
}

impl ConfigFile {
    fn into_builder(self) -> PipelineConfigBuilder {
        PipelineConfigBuilder {
            database_path: self.database_path,
            queue_key: self.queue_key,
            cache_prefix: self.cache_prefix,
            default_cache_ttl: self.default_cache_ttl_ms.map(Duration::from_millis),
            assume_online: self.assume_online,
        }
    }
}

/// Configuration errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("could not parse configuration: {0}")]
    Parse(String),
    #[error("missing value: {0}")]
    MissingValue(&'static str),
    #[error("invalid value for {field}: {message}")]
    InvalidValue {
        field: &'static str,
        message: String,
    },
    #[error("queue key '{queue_key}' collides with cache prefix '{cache_prefix}'")]
    KeyCollision {
        queue_key: String,
        cache_prefix: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::builder().build().unwrap();
        assert_eq!(config.queue_key, "pendingActions");
        assert_eq!(config.cache_prefix, "cache_");
        assert_eq!(config.default_cache_ttl, Duration::from_millis(300_000));
        assert!(config.assume_online);
        assert!(config.database_path.ends_with("dashsync/local.db"));
    }

    #[test]
    fn test_from_toml() {
        let config = PipelineConfig::from_toml_str(
            r#"
            database_path = "/tmp/dash.db"
            default_cache_ttl_ms = 1000
            assume_online = false
            "#,
        )
        .unwrap();
        assert_eq!(config.database_path, PathBuf::from("/tmp/dash.db"));
        assert_eq!(config.default_cache_ttl, Duration::from_millis(1000));
        assert!(!config.assume_online);
        assert_eq!(config.queue_key, DEFAULT_QUEUE_KEY);
    }

    #[test]
    fn test_unknown_toml_field_rejected() {
        let result = PipelineConfig::from_toml_str("eviction = \"lru\"");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_queue_key_collision_rejected() {
        let result = PipelineConfig::builder()
            .queue_key("cache_pending")
            .build();
        assert!(matches!(result, Err(ConfigError::KeyCollision { .. })));
    }

    #[test]
    fn test_zero_ttl_rejected() {
        let result = PipelineConfig::builder()
            .default_cache_ttl(Duration::ZERO)
            .build();
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_env_overrides() {
        let config = PipelineConfig::builder()
            .apply_env(|name| match name {
                ENV_DB_PATH => Some("/var/lib/dash.db".to_string()),
                ENV_CACHE_TTL_MS => Some("2500".to_string()),
                _ => None,
            })
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(config.database_path, PathBuf::from("/var/lib/dash.db"));
        assert_eq!(config.default_cache_ttl, Duration::from_millis(2500));
    }

    #[test]
    fn test_env_bad_ttl() {
        let result = PipelineConfig::builder().apply_env(|name| {
            (name == ENV_CACHE_TTL_MS).then(|| "soon".to_string())
        });
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }
}
