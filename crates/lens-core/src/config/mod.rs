//! Configuration management for Semantic Lens.
//!
//! Configuration is loaded from multiple sources with the following priority:
//! 1. Environment variables (highest priority)
//! 2. Project-local `lens.toml` file
//! 3. User config `~/.config/semantic-lens/config.toml`
//! 4. Built-in defaults (lowest priority)

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

mod defaults;

pub use defaults::*;

use crate::graph::EdgeFamilies;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LensConfig {
    /// Graph store backend selection.
    pub store: StoreConfig,

    /// View cache sizing.
    pub cache: CacheConfig,

    /// Pattern matching limits.
    pub matching: MatchingConfig,

    /// Edge kind families used by queries and views.
    pub graph: GraphConfig,

    /// HTTP transport settings.
    pub server: ServerConfig,
}

impl LensConfig {
    /// Load configuration from default locations.
    ///
    /// Searches for config in order:
    /// 1. `./lens.toml` (project local)
    /// 2. `~/.config/semantic-lens/config.toml` (user config)
    /// 3. Falls back to defaults
    pub fn load() -> Result<Self, ConfigError> {
        if Path::new(PROJECT_CONFIG_FILE).exists() {
            return Self::from_file(PROJECT_CONFIG_FILE);
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join(USER_CONFIG_DIR).join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        let mut config = Self::default();
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: LensConfig = toml::from_str(&content)?;

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Reject values no component can work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache.max_size == 0 {
            return Err(ConfigError::Invalid("cache.max_size must be at least 1".into()));
        }
        if self.matching.max_matches_per_pattern == 0 {
            return Err(ConfigError::Invalid(
                "matching.max_matches_per_pattern must be at least 1".into(),
            ));
        }
        if self.store.backend == StoreBackend::Remote && self.store.endpoint.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "store.endpoint is required for the remote backend".into(),
            ));
        }
        Ok(())
    }

    /// Apply environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(backend) = std::env::var("LENS_STORE_BACKEND") {
            match backend.to_ascii_lowercase().as_str() {
                "embedded" | "memory" => self.store.backend = StoreBackend::Embedded,
                "remote" | "surreal" | "surrealdb" => self.store.backend = StoreBackend::Remote,
                _ => {}
            }
        }
        if let Ok(endpoint) = std::env::var("LENS_STORE_ENDPOINT") {
            self.store.endpoint = endpoint;
        }
        if let Ok(ns) = std::env::var("LENS_STORE_NAMESPACE") {
            self.store.namespace = ns;
        }
        if let Ok(db) = std::env::var("LENS_STORE_DATABASE") {
            self.store.database = db;
        }
        if let Ok(user) = std::env::var("LENS_STORE_USERNAME") {
            self.store.username = Some(user);
        }
        if let Ok(pass) = std::env::var("LENS_STORE_PASSWORD") {
            self.store.password = Some(pass);
        }

        if let Ok(size) = std::env::var("LENS_CACHE_MAX_SIZE") {
            if let Ok(n) = size.parse() {
                self.cache.max_size = n;
            }
        }
        if let Ok(ttl) = std::env::var("LENS_CACHE_TTL_MS") {
            if let Ok(n) = ttl.parse() {
                self.cache.ttl_ms = n;
            }
        }

        if let Ok(max) = std::env::var("LENS_MAX_MATCHES") {
            if let Ok(n) = max.parse() {
                self.matching.max_matches_per_pattern = n;
            }
        }

        if let Ok(port) = std::env::var("LENS_PORT") {
            if let Ok(n) = port.parse() {
                self.server.port = n;
            }
        }
    }

    /// Create a default config file content as a string.
    pub fn default_config_string() -> String {
        let config = LensConfig::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

/// Which `GraphStore` implementation to construct.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// In-process store.
    #[default]
    Embedded,
    /// SurrealDB-backed store.
    Remote,
}

/// Graph store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Backend selected at construction time.
    pub backend: StoreBackend,

    /// SurrealDB endpoint (`ws://`, `http://`, `mem://`, `rocksdb://`).
    pub endpoint: String,

    /// SurrealDB namespace.
    pub namespace: String,

    /// SurrealDB database.
    pub database: String,

    /// Root username (optional).
    pub username: Option<String>,

    /// Root password (can also be set via environment variable).
    #[serde(skip_serializing)]
    pub password: Option<String>,

    /// Connect timeout in milliseconds.
    pub connect_timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Embedded,
            endpoint: DEFAULT_STORE_ENDPOINT.to_string(),
            namespace: DEFAULT_STORE_NAMESPACE.to_string(),
            database: DEFAULT_STORE_DATABASE.to_string(),
            username: None,
            password: None,
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
        }
    }
}

impl StoreConfig {
    /// Remote store config pointing at `endpoint`.
    pub fn remote(endpoint: impl Into<String>) -> Self {
        Self {
            backend: StoreBackend::Remote,
            endpoint: endpoint.into(),
            ..Default::default()
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

/// View cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum number of live entries.
    pub max_size: usize,

    /// Default entry lifetime in milliseconds.
    pub ttl_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_size: DEFAULT_CACHE_MAX_SIZE,
            ttl_ms: DEFAULT_CACHE_TTL_MS,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_ms)
    }
}

/// Pattern matching configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    /// Stop searching a pattern after this many bindings.
    pub max_matches_per_pattern: usize,

    /// Match patterns in parallel on the rayon pool.
    pub parallel: bool,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            max_matches_per_pattern: DEFAULT_MAX_MATCHES_PER_PATTERN,
            parallel: true,
        }
    }
}

/// Edge kind families.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    pub call_kinds: Vec<String>,
    pub inheritance_kinds: Vec<String>,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            call_kinds: DEFAULT_CALL_KINDS.iter().map(|s| s.to_string()).collect(),
            inheritance_kinds: DEFAULT_INHERITANCE_KINDS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl GraphConfig {
    pub fn edge_families(&self) -> EdgeFamilies {
        EdgeFamilies {
            call: self.call_kinds.clone(),
            inheritance: self.inheritance_kinds.clone(),
        }
    }
}

/// HTTP transport configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_SERVER_HOST.to_string(),
            port: DEFAULT_SERVER_PORT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LensConfig::default();
        assert_eq!(config.store.backend, StoreBackend::Embedded);
        assert_eq!(config.cache.max_size, DEFAULT_CACHE_MAX_SIZE);
        assert_eq!(config.server.port, DEFAULT_SERVER_PORT);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_to_toml() {
        let toml_str = LensConfig::default_config_string();
        assert!(toml_str.contains("[store]"));
        assert!(toml_str.contains("[cache]"));
        assert!(toml_str.contains("[matching]"));
        assert!(!toml_str.contains("password"));
    }

    #[test]
    fn test_zero_cache_rejected() {
        let mut config = LensConfig::default();
        config.cache.max_size = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }
}
