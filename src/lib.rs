// GPS record model and validation
pub mod record;

// Shared store adapter
pub mod store;

// Change detection, fan-out and request handling
pub mod relay;

// Live connections and wire protocol
pub mod subscription;

// Store connectivity reporting
pub mod health;

// HTTP and WebSocket APIs
pub mod api;

// Configuration (TOML file + environment)
pub mod config;

pub mod error;

pub use error::RelayError;
pub use record::GpsRecord;
pub use relay::Relay;
