use super::{Connectivity, GpsStore, StoreError, StoreStatus};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::watch;
use tracing::info;

/// In-process store.
///
/// Backs the `memory` backend for local runs and stands in for Redis in
/// tests: availability can be toggled and operation failures injected.
pub struct MemoryStore {
    values: DashMap<String, String>,
    connectivity: Connectivity,
    fail_operations: AtomicBool,
    writes: AtomicU64,
}

impl MemoryStore {
    /// Create a store that is immediately ready
    pub fn new() -> Self {
        Self::with_status(StoreStatus::Ready)
    }

    /// Create a store that never becomes available
    pub fn offline() -> Self {
        Self::with_status(StoreStatus::Error)
    }

    fn with_status(status: StoreStatus) -> Self {
        Self {
            values: DashMap::new(),
            connectivity: Connectivity::new(status),
            fail_operations: AtomicBool::new(false),
            writes: AtomicU64::new(0),
        }
    }

    /// Simulate the connection coming up or dropping
    pub fn set_available(&self, available: bool) {
        let next = if available {
            StoreStatus::Ready
        } else {
            StoreStatus::Error
        };
        self.connectivity.transition(next);
    }

    /// Make every operation fail as if the connected store rejected it
    pub fn fail_operations(&self, fail: bool) {
        self.fail_operations.store(fail, Ordering::SeqCst);
    }

    /// Write directly, bypassing availability checks and write accounting.
    ///
    /// Models a producer writing to the shared store out of band.
    pub fn insert_raw(&self, key: &str, value: &str) {
        self.values.insert(key.to_string(), value.to_string());
    }

    /// Read directly, bypassing availability checks
    pub fn get_raw(&self, key: &str) -> Option<String> {
        self.values.get(key).map(|v| v.clone())
    }

    /// Number of successful writes through [`GpsStore::set`]
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<(), StoreError> {
        if !self.connectivity.current().is_available() {
            return Err(StoreError::Unavailable);
        }
        if self.fail_operations.load(Ordering::SeqCst) {
            return Err(StoreError::OperationFailed(
                "injected failure".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GpsStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.check()?;
        Ok(self.get_raw(key))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.check()?;
        self.values.insert(key.to_string(), value.to_string());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.check()
    }

    fn status(&self) -> StoreStatus {
        self.connectivity.current()
    }

    fn subscribe(&self) -> watch::Receiver<StoreStatus> {
        self.connectivity.subscribe()
    }

    async fn close(&self) {
        if self.connectivity.transition(StoreStatus::Closed) {
            info!("In-memory store closed");
        }
    }
}
