use crate::record::GpsRecord;
use crate::subscription::{ConnectionRegistry, ServerEvent};
use std::sync::{Arc, Mutex};
use tracing::{debug, error, info};

/// Outcome of one broadcast, for logging and tests
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Connections registered when the broadcast began
    pub attempted: usize,
    /// Connections whose queue accepted the frame
    pub delivered: usize,
}

/// Fans a GPS update out to every registered connection.
///
/// Fire-and-forget: a failed delivery is logged and skipped, never
/// returned to the caller.
pub struct Broadcaster {
    registry: Arc<ConnectionRegistry>,
    /// Serializes broadcasts so every connection sees them in trigger order
    order: Mutex<()>,
}

impl Broadcaster {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self {
            registry,
            order: Mutex::new(()),
        }
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Deliver a `gps-data-update` carrying `record` to all connections
    pub fn broadcast(&self, record: &GpsRecord) -> BroadcastReport {
        // Encoded once; every connection gets the same immutable frame
        let frame = match ServerEvent::GpsDataUpdate(record.clone()).to_frame() {
            Ok(frame) => frame,
            Err(e) => {
                error!(error = %e, "Failed to encode GPS update, dropping broadcast");
                return BroadcastReport::default();
            }
        };

        let _order = self.order.lock().unwrap_or_else(|e| e.into_inner());

        let targets = self.registry.snapshot();
        let mut report = BroadcastReport {
            attempted: targets.len(),
            delivered: 0,
        };

        for handle in targets {
            match handle.deliver(frame.clone()) {
                Ok(()) => report.delivered += 1,
                Err(e) => debug!(connection_id = %handle.id(), error = %e, "Broadcast delivery failed"),
            }
        }

        info!(
            clients = report.delivered,
            attempted = report.attempted,
            "Broadcasted GPS data"
        );
        report
    }
}
