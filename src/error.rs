use crate::record::RecordError;
use crate::store::StoreError;
use crate::subscription::ServerEvent;
use std::fmt;

const EXPECTED_FORMAT: &str = r#"Expected format: {"c": {...}, "p": {...}, "s": "active"}"#;

/// Failures surfaced to a requester by the protocol handler
#[derive(Debug, Clone, PartialEq)]
pub enum RelayError {
    /// No active store connection
    StoreUnavailable,
    /// The connected store failed the call
    StoreOperationFailed(String),
    /// Stored or incoming payload did not parse or validate
    MalformedRecord(RecordError),
    /// The store holds no record under `key`
    NotFound { key: String },
}

impl fmt::Display for RelayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelayError::StoreUnavailable => write!(f, "store connection is not established"),
            RelayError::StoreOperationFailed(e) => write!(f, "{}", e),
            RelayError::MalformedRecord(e) => write!(f, "{}", e),
            RelayError::NotFound { key } => write!(f, "{} key not found in store", key),
        }
    }
}

impl std::error::Error for RelayError {}

impl From<StoreError> for RelayError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Unavailable => RelayError::StoreUnavailable,
            StoreError::OperationFailed(msg) => RelayError::StoreOperationFailed(msg),
        }
    }
}

impl From<RecordError> for RelayError {
    fn from(e: RecordError) -> Self {
        RelayError::MalformedRecord(e)
    }
}

/// Which request a failure belongs to; picks the `gps-error` wording
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Fetch,
    Update,
}

impl RelayError {
    /// The `gps-error` reply for this failure
    pub fn to_reply(&self, op: Operation) -> ServerEvent {
        match (self, op) {
            (RelayError::StoreUnavailable, _) => {
                ServerEvent::error("Redis not available", "Redis connection is not established")
            }
            (RelayError::NotFound { key }, _) => {
                ServerEvent::error("No GPS data found", format!("{} key not found in Redis", key))
            }
            (RelayError::MalformedRecord(_), Operation::Update) => {
                ServerEvent::error("Invalid GPS data format", EXPECTED_FORMAT)
            }
            (_, Operation::Fetch) => ServerEvent::error("Failed to fetch GPS data", self.to_string()),
            (_, Operation::Update) => {
                ServerEvent::error("Failed to update GPS data", self.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subscription::ErrorMessage;

    fn reply(e: RelayError, op: Operation) -> ErrorMessage {
        match e.to_reply(op) {
            ServerEvent::GpsError(msg) => msg,
            other => panic!("expected gps-error, got {:?}", other),
        }
    }

    #[test]
    fn test_unavailable_wording_is_shared() {
        assert_eq!(reply(RelayError::StoreUnavailable, Operation::Fetch).error, "Redis not available");
        assert_eq!(reply(RelayError::StoreUnavailable, Operation::Update).error, "Redis not available");
    }

    #[test]
    fn test_not_found_mentions_key() {
        let msg = reply(RelayError::NotFound { key: "gps_data".to_string() }, Operation::Fetch);
        assert_eq!(msg.error, "No GPS data found");
        assert_eq!(msg.message, "gps_data key not found in Redis");
    }

    #[test]
    fn test_malformed_depends_on_operation() {
        let e = RelayError::MalformedRecord(RecordError::MissingField("c"));
        assert_eq!(reply(e.clone(), Operation::Update).error, "Invalid GPS data format");
        assert_eq!(reply(e, Operation::Fetch).error, "Failed to fetch GPS data");
    }

    #[test]
    fn test_store_failure_wording() {
        let e: RelayError = StoreError::OperationFailed("SET failed: boom".to_string()).into();
        let msg = reply(e, Operation::Update);
        assert_eq!(msg.error, "Failed to update GPS data");
        assert_eq!(msg.message, "SET failed: boom");
    }
}
