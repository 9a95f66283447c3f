use super::Relay;
use crate::error::{Operation, RelayError};
use crate::record::GpsRecord;
use crate::subscription::{ClientEvent, ConnectionId, ServerEvent};
use serde_json::Value;
use tracing::{info, warn};

impl Relay {
    /// Handle one client event and produce the reply for the requester.
    ///
    /// Broadcasts triggered by an update go to every connection through the
    /// broadcaster; only the returned event is meant for `connection_id`.
    pub async fn handle_event(&self, connection_id: ConnectionId, event: ClientEvent) -> ServerEvent {
        match event {
            ClientEvent::RequestGpsData => match self.fetch_latest().await {
                Ok(record) => ServerEvent::GpsData(record),
                Err(e) => {
                    warn!(connection_id = %connection_id, error = %e, "GPS data request failed");
                    e.to_reply(Operation::Fetch)
                }
            },
            ClientEvent::UpdateGpsData(payload) => match self.accept_update(payload).await {
                Ok(record) => {
                    info!(connection_id = %connection_id, "GPS data updated via live channel");
                    ServerEvent::update_success(record)
                }
                Err(e) => {
                    warn!(connection_id = %connection_id, error = %e, "GPS data update rejected");
                    e.to_reply(Operation::Update)
                }
            },
            ClientEvent::Ping => ServerEvent::pong(),
        }
    }

    /// Read the current record from the store
    pub async fn fetch_latest(&self) -> Result<GpsRecord, RelayError> {
        if !self.store.is_available() {
            return Err(RelayError::StoreUnavailable);
        }

        let raw = self
            .store
            .get(&self.key)
            .await?
            .ok_or_else(|| RelayError::NotFound {
                key: self.key.clone(),
            })?;

        Ok(GpsRecord::parse(&raw)?)
    }

    /// Validate, store and broadcast a producer update
    pub async fn accept_update(&self, payload: Value) -> Result<GpsRecord, RelayError> {
        let record = GpsRecord::from_value(payload)?;
        record.validate()?;

        self.poller.publish(&record).await?;
        Ok(record)
    }
}
