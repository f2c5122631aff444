//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and `DELTAPROXY_*` environment overrides.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::api::ApiConfig;
use crate::cache::MemoryCacheConfig;
use crate::engine::EngineConfig;
use crate::origin::HttpOriginConfig;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub origin: OriginConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub engine: EngineSettings,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP listener configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Whole-request deadline
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8480
}

fn default_request_timeout() -> u64 {
    60
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

/// Origin configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OriginConfig {
    #[serde(default = "default_origin_url")]
    pub url: String,

    /// API dialect of the origin
    #[serde(default = "default_backend")]
    pub backend: String,

    /// Per-fetch timeout
    #[serde(default = "default_origin_timeout")]
    pub timeout_ms: u64,
}

fn default_origin_url() -> String {
    "http://localhost:8112".to_string()
}

fn default_backend() -> String {
    "irondb".to_string()
}

fn default_origin_timeout() -> u64 {
    30_000
}

impl Default for OriginConfig {
    fn default() -> Self {
        Self {
            url: default_origin_url(),
            backend: default_backend(),
            timeout_ms: default_origin_timeout(),
        }
    }
}

/// In-memory cache configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_ttl")]
    pub ttl_secs: u64,

    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
}

fn default_ttl() -> u64 {
    6 * 3600
}

fn default_max_entries() -> usize {
    10_000
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl(),
            max_entries: default_max_entries(),
        }
    }
}

/// Delta proxy engine configuration
#[derive(Debug, Clone, Deserialize)]
pub struct EngineSettings {
    #[serde(default = "default_fast_forward")]
    pub fast_forward: bool,

    #[serde(default)]
    pub backfill_tolerance_secs: u64,

    /// 0 keeps everything
    #[serde(default = "default_retention_steps")]
    pub retention_steps: usize,
}

fn default_fast_forward() -> bool {
    true
}

fn default_retention_steps() -> usize {
    1024
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            fast_forward: default_fast_forward(),
            backfill_tolerance_secs: 0,
            retention_steps: default_retention_steps(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// `pretty` or `json`
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

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load from default locations or environment
    pub fn load_default() -> Self {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("deltaproxy").join("config.toml")),
            Some(PathBuf::from("/etc/deltaproxy/config.toml")),
            Some(PathBuf::from("./config.toml")),
        ];

        for path_opt in config_paths.iter().flatten() {
            if path_opt.exists() {
                match Self::load_with_env(path_opt) {
                    Ok(config) => {
                        tracing::info!("Loaded config from {:?}", path_opt);
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path_opt, e);
                    }
                }
            }
        }

        tracing::info!("Using default config with environment overrides");
        Self::from_env()
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    /// Apply `DELTAPROXY_*` overrides from a variable lookup
    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(host) = var("DELTAPROXY_HOST") {
            self.server.host = host;
        }
        if let Some(port) = var("DELTAPROXY_PORT").and_then(|p| p.parse().ok()) {
            self.server.port = port;
        }

        if let Some(url) = var("DELTAPROXY_ORIGIN_URL") {
            self.origin.url = url;
        }
        if let Some(backend) = var("DELTAPROXY_ORIGIN_BACKEND") {
            self.origin.backend = backend;
        }

        if let Some(ttl) = var("DELTAPROXY_CACHE_TTL_SECS").and_then(|v| v.parse().ok()) {
            self.cache.ttl_secs = ttl;
        }

        if let Some(ff) = var("DELTAPROXY_FAST_FORWARD").and_then(|v| v.parse().ok()) {
            self.engine.fast_forward = ff;
        }

        if let Some(level) = var("DELTAPROXY_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = var("DELTAPROXY_LOG_FORMAT") {
            self.logging.format = format;
        }
    }

    /// Reject settings the server cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.origin.backend != "irondb" {
            return Err(ConfigError::Invalid(format!(
                "unsupported origin backend: {}",
                self.origin.backend
            )));
        }
        if self.origin.timeout_ms == 0 {
            return Err(ConfigError::Invalid("origin.timeout_ms must be > 0".to_string()));
        }
        if self.server.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "server.request_timeout_secs must be > 0".to_string(),
            ));
        }
        if !matches!(self.logging.format.as_str(), "pretty" | "json") {
            return Err(ConfigError::Invalid(format!(
                "unknown log format: {}",
                self.logging.format
            )));
        }
        Ok(())
    }

    pub fn api_config(&self) -> ApiConfig {
        ApiConfig {
            host: self.server.host.clone(),
            port: self.server.port,
            request_timeout_ms: self.server.request_timeout_secs.saturating_mul(1000),
        }
    }

    pub fn origin_config(&self) -> HttpOriginConfig {
        HttpOriginConfig {
            base_url: self.origin.url.clone(),
            ..HttpOriginConfig::default()
        }
    }

    pub fn cache_config(&self) -> MemoryCacheConfig {
        MemoryCacheConfig {
            ttl: Duration::from_secs(self.cache.ttl_secs),
            max_entries: self.cache.max_entries,
        }
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            fetch_timeout: Duration::from_millis(self.origin.timeout_ms),
            fast_forward: self.engine.fast_forward,
            backfill_tolerance_ms: (self.engine.backfill_tolerance_secs as i64).saturating_mul(1000),
            retention_steps: self.engine.retention_steps,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# Delta Proxy Configuration
#
# Environment variables override these settings:
# - DELTAPROXY_HOST
# - DELTAPROXY_PORT
# - DELTAPROXY_ORIGIN_URL
# - DELTAPROXY_ORIGIN_BACKEND
# - DELTAPROXY_CACHE_TTL_SECS
# - DELTAPROXY_FAST_FORWARD
# - DELTAPROXY_LOG_LEVEL
# - DELTAPROXY_LOG_FORMAT

[server]
# Listen address
host = "0.0.0.0"
port = 8480

# Deadline for a whole client request (seconds)
request_timeout_secs = 60

[origin]
# Origin base URL
url = "http://localhost:8112"

# Origin API dialect
backend = "irondb"

# Deadline for each origin fetch (ms)
timeout_ms = 30000

[cache]
# Entries expire this long after their last write (seconds)
ttl_secs = 21600

# Least recently used entries are evicted past this count
max_entries = 10000

[engine]
# Splice a fresh value for the current step into responses reaching now
fast_forward = true

# Data younger than this is served but not cached (seconds)
backfill_tolerance_secs = 0

# Steps kept per cached series (0 = unlimited)
retention_steps = 1024

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_default_template_parses() {
        let file = write_config(&generate_default_config());
        let config = Config::load(file.path()).unwrap();

        assert_eq!(config.server.port, 8480);
        assert_eq!(config.origin.backend, "irondb");
        assert_eq!(config.cache.ttl_secs, 21600);
        assert!(config.engine.fast_forward);
        assert_eq!(config.logging.format, "pretty");
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let file = write_config(
            r#"
[origin]
url = "http://irondb:8112"

[engine]
backfill_tolerance_secs = 30
"#,
        );
        let config = Config::load(file.path()).unwrap();

        assert_eq!(config.origin.url, "http://irondb:8112");
        assert_eq!(config.origin.timeout_ms, 30_000);
        assert_eq!(config.server.port, 8480);
        assert_eq!(config.engine_config().backfill_tolerance_ms, 30_000);
        assert_eq!(config.engine_config().fetch_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_parse_error() {
        let file = write_config("[server\nport = ");
        let err = Config::load(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_missing_file() {
        let err = Config::load(Path::new("/nonexistent/deltaproxy.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_unsupported_backend() {
        let file = write_config("[origin]\nbackend = \"graphite\"\n");
        let err = Config::load(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            ("DELTAPROXY_PORT", "9999"),
            ("DELTAPROXY_ORIGIN_URL", "http://origin:8112"),
            ("DELTAPROXY_FAST_FORWARD", "false"),
            ("DELTAPROXY_CACHE_TTL_SECS", "not-a-number"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_overrides(|name| vars.get(name).map(|v| v.to_string()));

        assert_eq!(config.server.port, 9999);
        assert_eq!(config.origin.url, "http://origin:8112");
        assert!(!config.engine.fast_forward);
        assert_eq!(config.cache.ttl_secs, 21600);
    }

    #[test]
    fn test_component_configs() {
        let config = Config::default();

        assert_eq!(config.api_config().addr(), "0.0.0.0:8480");
        assert_eq!(config.api_config().request_timeout_ms, 60_000);
        assert_eq!(config.origin_config().base_url, "http://localhost:8112");
        assert_eq!(config.cache_config().max_entries, 10_000);
        assert_eq!(config.engine_config().retention_steps, 1024);
    }
}
