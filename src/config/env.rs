// Environment overrides, applied on top of defaults or the TOML file.
//
// Values that fail to parse are ignored and the previous value is kept.

use super::{RelayConfig, StoreBackend};

pub const REDIS_HOST: &str = "REDIS_HOST";
pub const REDIS_PORT: &str = "REDIS_PORT";
pub const REDIS_PASSWORD: &str = "REDIS_PASSWORD";
pub const REDIS_DB: &str = "REDIS_DB";
pub const STORE_BACKEND: &str = "GPS_STORE_BACKEND";
pub const STORE_KEY: &str = "GPS_STORE_KEY";
pub const POLL_INTERVAL_MS: &str = "GPS_POLL_INTERVAL_MS";
pub const HOST: &str = "HOST";
pub const PORT: &str = "PORT";
pub const ENVIRONMENT: &str = "APP_ENV";
/// Consulted when APP_ENV is unset or empty
pub const NODE_ENVIRONMENT: &str = "NODE_ENV";
pub const ALLOWED_ORIGINS: &str = "ALLOWED_ORIGINS";
pub const FRONTEND_URL: &str = "FRONTEND_URL";

pub(crate) fn apply_overrides<F>(config: &mut RelayConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(v) = lookup(STORE_BACKEND) {
        match v.to_ascii_lowercase().as_str() {
            "redis" => config.store.backend = StoreBackend::Redis,
            "memory" => config.store.backend = StoreBackend::Memory,
            _ => {}
        }
    }
    if let Some(v) = lookup(REDIS_HOST) {
        if !v.is_empty() {
            config.store.host = v;
        }
    }
    if let Some(v) = lookup(REDIS_PORT) {
        if let Ok(n) = v.parse::<u16>() {
            config.store.port = n;
        }
    }
    if let Some(v) = lookup(REDIS_PASSWORD) {
        config.store.password = if v.is_empty() { None } else { Some(v) };
    }
    if let Some(v) = lookup(REDIS_DB) {
        if let Ok(n) = v.parse::<i64>() {
            config.store.db = n;
        }
    }
    if let Some(v) = lookup(STORE_KEY) {
        if !v.is_empty() {
            config.store.key = v;
        }
    }
    if let Some(v) = lookup(POLL_INTERVAL_MS) {
        if let Ok(n) = v.parse::<u64>() {
            config.poller.interval_ms = n;
        }
    }
    if let Some(v) = lookup(HOST) {
        if !v.is_empty() {
            config.server.host = v;
        }
    }
    if let Some(v) = lookup(PORT) {
        if let Ok(n) = v.parse::<u16>() {
            config.server.port = n;
        }
    }
    if let Some(v) = [ENVIRONMENT, NODE_ENVIRONMENT]
        .into_iter()
        .filter_map(|name| lookup(name))
        .find(|v| !v.is_empty())
    {
        config.server.environment = v;
    }
    if let Some(v) = lookup(ALLOWED_ORIGINS) {
        config.server.allowed_origins = v
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
    }
    if let Some(v) = lookup(FRONTEND_URL) {
        let v = v.trim().to_string();
        if !v.is_empty() && !config.server.allowed_origins.contains(&v) {
            config.server.allowed_origins.push(v);
        }
    }
}
