// Shared store adapter
//
// The relay only needs the latest-value slot of the shared store: get, set,
// a liveness check and a connectivity flag. Backends report every failure as
// a StoreError value; nothing here panics or tears the process down.

mod connectivity;
mod memory;
mod redis_store;

pub use self::connectivity::{Connectivity, StoreStatus};
pub use self::memory::MemoryStore;
pub use self::redis_store::{redis_url, RedisStore};

use crate::config::{StoreBackend, StoreConfig};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info};

/// Store adapter errors
#[derive(Debug, Clone, PartialEq)]
pub enum StoreError {
    /// No active connection; the call was not attempted
    Unavailable,
    /// A connected store rejected or failed the call
    OperationFailed(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Unavailable => write!(f, "store connection is not established"),
            StoreError::OperationFailed(e) => write!(f, "store operation failed: {}", e),
        }
    }
}

impl std::error::Error for StoreError {}

/// Key-value store holding the latest GPS record.
///
/// Implementations must short-circuit with [`StoreError::Unavailable`] when
/// they are not [`StoreStatus::Ready`] instead of attempting the call.
#[async_trait]
pub trait GpsStore: Send + Sync {
    /// Read a value; `Ok(None)` when the key is absent.
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Overwrite a value.
    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Active liveness check.
    async fn ping(&self) -> Result<(), StoreError>;

    /// Current connectivity state (may be stale; see [`GpsStore::ping`]).
    fn status(&self) -> StoreStatus;

    /// Observe connectivity transitions.
    fn subscribe(&self) -> watch::Receiver<StoreStatus>;

    /// Tear down the connection. Never fails; problems are logged.
    async fn close(&self);

    fn is_available(&self) -> bool {
        self.status().is_available()
    }
}

/// Build the configured store backend.
///
/// A Redis client that cannot be constructed (e.g. an invalid address) is
/// logged and replaced with an offline store, so the server still starts and
/// reports the store as disconnected.
pub fn connect(config: &StoreConfig) -> Arc<dyn GpsStore> {
    match config.backend {
        StoreBackend::Memory => {
            info!("Using in-memory GPS store");
            Arc::new(MemoryStore::new())
        }
        StoreBackend::Redis => match RedisStore::connect(config) {
            Ok(store) => store as Arc<dyn GpsStore>,
            Err(e) => {
                error!(error = %e, "Failed to create Redis client, continuing without store");
                Arc::new(MemoryStore::offline())
            }
        },
    }
}
