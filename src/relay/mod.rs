// Change-detection and fan-out relay
//
// One Relay is built at startup and shared by every connection task. It owns
// the connection registry, the broadcaster and the poller, and holds the
// injected store adapter.

mod broadcaster;
mod handler;
mod poller;

pub use broadcaster::{BroadcastReport, Broadcaster};
pub use poller::{Poller, SkipReason, TickOutcome};

use crate::config::RelayConfig;
use crate::store::{GpsStore, StoreStatus};
use crate::subscription::ConnectionRegistry;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::info;


pub struct Relay {
    store: Arc<dyn GpsStore>,
    registry: Arc<ConnectionRegistry>,
    broadcaster: Arc<Broadcaster>,
    poller: Arc<Poller>,
    key: String,
    watcher: Mutex<Option<JoinHandle<()>>>,
}

impl Relay {
    pub fn new(store: Arc<dyn GpsStore>, key: impl Into<String>, poll_interval: Duration) -> Self {
        let key = key.into();
        let registry = Arc::new(ConnectionRegistry::new());
        let broadcaster = Arc::new(Broadcaster::new(Arc::clone(&registry)));
        let poller = Arc::new(Poller::new(
            Arc::clone(&store),
            Arc::clone(&broadcaster),
            key.clone(),
            poll_interval,
        ));

        Self {
            store,
            registry,
            broadcaster,
            poller,
            key,
            watcher: Mutex::new(None),
        }
    }

    pub fn from_config(store: Arc<dyn GpsStore>, config: &RelayConfig) -> Self {
        Self::new(store, config.store.key.clone(), config.poller.interval())
    }

    pub fn store(&self) -> &Arc<dyn GpsStore> {
        &self.store
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    pub fn broadcaster(&self) -> &Arc<Broadcaster> {
        &self.broadcaster
    }

    pub fn poller(&self) -> &Arc<Poller> {
        &self.poller
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Start the poller every time the store becomes ready.
    ///
    /// Must be called from within a Tokio runtime. Calling it again replaces
    /// the previous watcher.
    pub fn watch_connectivity(&self) {
        let mut status_rx = self.store.subscribe();
        let poller = Arc::clone(&self.poller);

        let handle = tokio::spawn(async move {
            loop {
                let status = *status_rx.borrow_and_update();
                match status {
                    StoreStatus::Ready => {
                        poller.start();
                    }
                    StoreStatus::Closed => {
                        poller.stop();
                        break;
                    }
                    StoreStatus::Connecting | StoreStatus::Error => {}
                }

                if status_rx.changed().await.is_err() {
                    break;
                }
            }
        });

        let previous = self
            .watcher
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .replace(handle);
        if let Some(previous) = previous {
            previous.abort();
        }
    }

    /// Stop background work, then release the store connection.
    pub async fn shutdown(&self) {
        info!("Shutting down GPS relay");

        let watcher = self.watcher.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(watcher) = watcher {
            watcher.abort();
        }

        self.poller.stop();
        self.store.close().await;

        info!("GPS relay stopped");
    }
}
