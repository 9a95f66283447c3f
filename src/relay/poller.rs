use crate::error::RelayError;
use crate::record::GpsRecord;
use crate::relay::broadcaster::{BroadcastReport, Broadcaster};
use crate::store::{GpsStore, StoreError};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Shortest accepted tick period; tokio::time::interval panics on zero
const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Why a tick did not broadcast
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    StoreUnavailable,
    ReadFailed,
    Empty,
    Malformed,
}

/// Result of one poll tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Broadcast(BroadcastReport),
    Unchanged,
    Skipped(SkipReason),
}

/// Change detector for out-of-band store writes.
///
/// Holds the canonical form of the last broadcast record. Both the timer
/// loop ([`Poller::tick`]) and the push path ([`Poller::publish`]) run their
/// whole read/write → broadcast → cache sequence under the same lock, so
/// ticks never interleave and broadcast order always follows store order.
pub struct Poller {
    store: Arc<dyn GpsStore>,
    broadcaster: Arc<Broadcaster>,
    key: String,
    interval: Duration,
    last_broadcast: Mutex<Option<String>>,
    task: StdMutex<Option<JoinHandle<()>>>,
}

impl Poller {
    pub fn new(
        store: Arc<dyn GpsStore>,
        broadcaster: Arc<Broadcaster>,
        key: impl Into<String>,
        interval: Duration,
    ) -> Self {
        Self {
            store,
            broadcaster,
            key: key.into(),
            interval: interval.max(MIN_INTERVAL),
            last_broadcast: Mutex::new(None),
            task: StdMutex::new(None),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Start the timer loop.
    ///
    /// Refused while the store is unavailable; a no-op when already running.
    /// Returns whether the poller is running afterwards.
    pub fn start(self: &Arc<Self>) -> bool {
        if !self.store.is_available() {
            warn!("Cannot start GPS poller - store not available");
            return false;
        }

        let mut task = self.task.lock().unwrap_or_else(|e| e.into_inner());
        if task.as_ref().map_or(false, |h| !h.is_finished()) {
            debug!("GPS poller already running");
            return true;
        }

        // The loop holds a weak reference so a dropped poller ends it
        let weak = Arc::downgrade(self);
        let period = self.interval;
        *task = Some(tokio::spawn(async move {
            let mut ticker = interval(period);

            // Skip missed ticks so a slow store never piles up work
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                ticker.tick().await;
                let Some(poller) = weak.upgrade() else {
                    break;
                };
                poller.tick().await;
            }
        }));

        info!(interval_ms = period.as_millis() as u64, "Started GPS poller");
        true
    }

    /// Stop the timer loop. Idempotent; returns whether it was running.
    pub fn stop(&self) -> bool {
        let handle = self.task.lock().unwrap_or_else(|e| e.into_inner()).take();
        match handle {
            Some(handle) => {
                handle.abort();
                info!("Stopped GPS poller");
                true
            }
            None => false,
        }
    }

    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .map_or(false, |h| !h.is_finished())
    }

    /// Canonical form of the last broadcast record
    pub async fn last_broadcast(&self) -> Option<String> {
        self.last_broadcast.lock().await.clone()
    }

    /// Check the store once and broadcast if the record changed
    pub async fn tick(&self) -> TickOutcome {
        let mut last = self.last_broadcast.lock().await;

        if !self.store.is_available() {
            debug!("Store unavailable, skipping GPS poll");
            return TickOutcome::Skipped(SkipReason::StoreUnavailable);
        }

        let raw = match self.store.get(&self.key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return TickOutcome::Skipped(SkipReason::Empty),
            Err(StoreError::Unavailable) => {
                debug!("Store unavailable, skipping GPS poll");
                return TickOutcome::Skipped(SkipReason::StoreUnavailable);
            }
            Err(e) => {
                warn!(error = %e, "Error reading GPS data from store");
                return TickOutcome::Skipped(SkipReason::ReadFailed);
            }
        };

        let (record, canonical) = match GpsRecord::parse(&raw).and_then(|r| {
            let canonical = r.canonical()?;
            Ok((r, canonical))
        }) {
            Ok(parsed) => parsed,
            Err(e) => {
                error!(error = %e, key = %self.key, "Stored GPS data is malformed");
                return TickOutcome::Skipped(SkipReason::Malformed);
            }
        };

        if last.as_deref() == Some(canonical.as_str()) {
            return TickOutcome::Unchanged;
        }

        info!("GPS data changed in store, broadcasting to clients");
        let report = self.broadcaster.broadcast(&record);
        *last = Some(canonical);
        TickOutcome::Broadcast(report)
    }

    /// Push path: write `record`, broadcast it, and remember it so the next
    /// tick does not broadcast it again.
    ///
    /// Nothing is broadcast if the write fails.
    pub async fn publish(&self, record: &GpsRecord) -> Result<BroadcastReport, RelayError> {
        let canonical = record.canonical()?;
        let mut last = self.last_broadcast.lock().await;

        self.store.set(&self.key, &canonical).await?;

        let report = self.broadcaster.broadcast(record);
        *last = Some(canonical);
        Ok(report)
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        if let Ok(mut task) = self.task.lock() {
            if let Some(handle) = task.take() {
                handle.abort();
            }
        }
    }
}
