use crate::store::GpsStore;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::warn;

/// Store connectivity as seen by monitors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreHealth {
    Connected,
    Disconnected,
}

/// Body of `GET /health`
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    /// Always "healthy" while the process serves; dependency outages only
    /// show up in `redis`
    pub status: &'static str,
    #[serde(rename = "redis")]
    pub store: StoreHealth,
    pub timestamp: DateTime<Utc>,
    pub port: u16,
    pub environment: String,
}

pub struct HealthReporter {
    store: Arc<dyn GpsStore>,
    port: u16,
    environment: String,
}

impl HealthReporter {
    pub fn new(store: Arc<dyn GpsStore>, port: u16, environment: impl Into<String>) -> Self {
        Self {
            store,
            port,
            environment: environment.into(),
        }
    }

    /// Build a report, probing the store when it claims to be connected
    pub async fn report(&self) -> HealthReport {
        HealthReport {
            status: "healthy",
            store: self.ping_store().await,
            timestamp: Utc::now(),
            port: self.port,
            environment: self.environment.clone(),
        }
    }

    async fn ping_store(&self) -> StoreHealth {
        if !self.store.is_available() {
            return StoreHealth::Disconnected;
        }

        // The cached flag may be stale; confirm with a round trip
        match self.store.ping().await {
            Ok(()) => StoreHealth::Connected,
            Err(e) => {
                warn!(error = %e, "Store ping failed");
                StoreHealth::Disconnected
            }
        }
    }
}
