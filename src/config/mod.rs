pub mod env;
pub mod origin;

pub use origin::OriginPolicy;

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Environment variable naming an optional TOML config file
pub const CONFIG_PATH_ENV: &str = "GPS_RELAY_CONFIG";

/// Complete relay configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RelayConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub poller: PollerConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

/// Which store backend to run against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Redis,
    Memory,
}

impl Default for StoreBackend {
    fn default() -> Self {
        StoreBackend::Redis
    }
}

/// Shared store configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,
    #[serde(default = "default_store_host")]
    pub host: String,
    #[serde(default = "default_store_port")]
    pub port: u16,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub db: i64,
    /// Key holding the latest GPS record
    #[serde(default = "default_store_key")]
    pub key: String,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default = "default_command_timeout_ms")]
    pub command_timeout_ms: u64,
    /// Delay between reconnection attempts
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

fn default_store_host() -> String {
    "127.0.0.1".to_string()
}

fn default_store_port() -> u16 {
    6379
}

fn default_store_key() -> String {
    "gps_data".to_string()
}

fn default_connect_timeout_ms() -> u64 {
    60_000
}

fn default_command_timeout_ms() -> u64 {
    5_000
}

fn default_retry_delay_ms() -> u64 {
    1_000
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            host: default_store_host(),
            port: default_store_port(),
            password: None,
            db: 0,
            key: default_store_key(),
            connect_timeout_ms: default_connect_timeout_ms(),
            command_timeout_ms: default_command_timeout_ms(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

/// Change-detection poller configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PollerConfig {
    /// How often to check the store for out-of-band updates (milliseconds)
    #[serde(default = "default_poll_interval_ms")]
    pub interval_ms: u64,
}

fn default_poll_interval_ms() -> u64 {
    2_000
}

impl PollerConfig {
    pub fn interval(&self) -> Duration {
        // A zero period would panic in tokio::time::interval
        Duration::from_millis(self.interval_ms.max(1))
    }
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_poll_interval_ms(),
        }
    }
}

/// HTTP / WebSocket server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_server_host")]
    pub host: String,
    #[serde(default = "default_server_port")]
    pub port: u16,
    /// Deployment environment name, reported by /health
    #[serde(default = "default_environment")]
    pub environment: String,
    /// Browser origins allowed to open the live channel
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,
}

fn default_server_host() -> String {
    "0.0.0.0".to_string()
}

fn default_server_port() -> u16 {
    8080
}

fn default_environment() -> String {
    "development".to_string()
}

fn default_allowed_origins() -> Vec<String> {
    vec![
        "http://localhost:5173".to_string(),
        "https://localhost:5173".to_string(),
        "*.ondigitalocean.app".to_string(),
    ]
}

impl ServerConfig {
    pub fn origin_policy(&self) -> OriginPolicy {
        OriginPolicy::new(self.allowed_origins.clone())
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_server_host(),
            port: default_server_port(),
            environment: default_environment(),
            allowed_origins: default_allowed_origins(),
        }
    }
}

/// Load configuration from TOML file
pub fn load_config(path: impl AsRef<Path>) -> Result<RelayConfig> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    let config: RelayConfig = toml::from_str(&contents)
        .with_context(|| format!("Failed to parse config file {}", path.display()))?;
    Ok(config)
}

impl RelayConfig {
    /// Build the process configuration: TOML file named by
    /// `GPS_RELAY_CONFIG` (if set), then environment overrides.
    pub fn from_env() -> Result<Self> {
        let mut config = match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) => load_config(path)?,
            Err(_) => Self::default(),
        };
        config.apply_env(|name| std::env::var(name).ok());
        Ok(config)
    }

    /// Apply environment-style overrides from `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        env::apply_overrides(self, lookup);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = RelayConfig::default();
        assert_eq!(config.store.backend, StoreBackend::Redis);
        assert_eq!(config.store.port, 6379);
        assert_eq!(config.store.key, "gps_data");
        assert_eq!(config.poller.interval_ms, 2000);
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.environment, "development");
        assert_eq!(config.server.allowed_origins.len(), 3);
    }

    #[test]
    fn test_config_deserialization() {
        let toml = r#"
            [store]
            backend = "memory"
            host = "redis.example.com"
            port = 15238
            password = "hunter2"
            db = 3
            key = "tracker_latest"

            [poller]
            interval_ms = 500

            [server]
            port = 9000
            environment = "production"
            allowed_origins = ["https://map.example.com"]
        "#;

        let config: RelayConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.store.backend, StoreBackend::Memory);
        assert_eq!(config.store.host, "redis.example.com");
        assert_eq!(config.store.password.as_deref(), Some("hunter2"));
        assert_eq!(config.store.db, 3);
        assert_eq!(config.store.key, "tracker_latest");
        assert_eq!(config.poller.interval(), Duration::from_millis(500));
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.allowed_origins, vec!["https://map.example.com"]);
    }

    #[test]
    fn test_partial_config() {
        let toml = r#"
            [poller]
            interval_ms = 100
        "#;

        let config: RelayConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.poller.interval_ms, 100);
        assert_eq!(config.store.host, "127.0.0.1"); // Default
        assert_eq!(config.store.command_timeout_ms, 5000); // Default
        assert_eq!(config.server.host, "0.0.0.0"); // Default
    }

    #[test]
    fn test_zero_interval_is_clamped() {
        let config = PollerConfig { interval_ms: 0 };
        assert_eq!(config.interval(), Duration::from_millis(1));
    }

    #[test]
    fn test_load_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[server]\nport = 7001").unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.server.port, 7001);
    }

    #[test]
    fn test_load_config_invalid_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[server\nport = ").unwrap();

        assert!(load_config(file.path()).is_err());
        assert!(load_config("/nonexistent/gps-relay.toml").is_err());
    }
}
