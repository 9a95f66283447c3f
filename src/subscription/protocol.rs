use crate::record::GpsRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Serialized server event, shared between every connection it is sent to
pub type Frame = Arc<str>;

pub const EVENT_REQUEST_GPS_DATA: &str = "request-gps-data";
pub const EVENT_UPDATE_GPS_DATA: &str = "update-gps-data";
pub const EVENT_PING: &str = "ping";

/// Wire envelope for client frames: `{"event": "...", "data": ...}`
#[derive(Debug, Deserialize)]
struct IncomingFrame {
    event: String,
    #[serde(default)]
    data: Value,
}

/// Client → Server events
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    /// Pull the current record
    RequestGpsData,
    /// Push a new record (validated by the handler, not here)
    UpdateGpsData(Value),
    /// Liveness check
    Ping,
}

/// Client frame could not be understood
#[derive(Debug, Clone, PartialEq)]
pub enum ProtocolError {
    InvalidFrame(String),
    UnknownEvent(String),
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolError::InvalidFrame(e) => write!(f, "invalid frame: {}", e),
            ProtocolError::UnknownEvent(name) => write!(f, "unknown event '{}'", name),
        }
    }
}

impl std::error::Error for ProtocolError {}

impl ClientEvent {
    /// Parse a text frame into a client event
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        let frame: IncomingFrame =
            serde_json::from_str(text).map_err(|e| ProtocolError::InvalidFrame(e.to_string()))?;

        match frame.event.as_str() {
            EVENT_REQUEST_GPS_DATA => Ok(ClientEvent::RequestGpsData),
            EVENT_UPDATE_GPS_DATA => Ok(ClientEvent::UpdateGpsData(frame.data)),
            EVENT_PING => Ok(ClientEvent::Ping),
            _ => Err(ProtocolError::UnknownEvent(frame.event)),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::RequestGpsData => EVENT_REQUEST_GPS_DATA,
            ClientEvent::UpdateGpsData(_) => EVENT_UPDATE_GPS_DATA,
            ClientEvent::Ping => EVENT_PING,
        }
    }
}

/// Server → Client events
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerEvent {
    /// Sent once on connect
    Welcome(WelcomeMessage),
    /// Reply to a pull, requester only
    GpsData(GpsRecord),
    /// Broadcast push to every connection
    GpsDataUpdate(GpsRecord),
    /// Ack for an accepted update
    GpsUpdateSuccess(UpdateSuccessMessage),
    /// Failure reply, requester only
    GpsError(ErrorMessage),
    /// Liveness reply
    Pong(PongMessage),
}

impl ServerEvent {
    pub fn welcome() -> Self {
        ServerEvent::Welcome(WelcomeMessage {
            message: "Connected to AU Journey WebSocket server".to_string(),
            timestamp: Utc::now(),
        })
    }

    pub fn pong() -> Self {
        ServerEvent::Pong(PongMessage {
            timestamp: Utc::now().timestamp_millis(),
        })
    }

    pub fn update_success(record: GpsRecord) -> Self {
        ServerEvent::GpsUpdateSuccess(UpdateSuccessMessage {
            success: true,
            message: "GPS data updated successfully".to_string(),
            data: record,
        })
    }

    pub fn error(error: impl Into<String>, message: impl Into<String>) -> Self {
        ServerEvent::GpsError(ErrorMessage {
            error: error.into(),
            message: message.into(),
        })
    }

    /// Serialize once for delivery
    pub fn to_frame(&self) -> Result<Frame, serde_json::Error> {
        serde_json::to_string(self).map(Frame::from)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct WelcomeMessage {
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UpdateSuccessMessage {
    pub success: bool,
    pub message: String,
    pub data: GpsRecord,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorMessage {
    pub error: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PongMessage {
    /// Unix epoch milliseconds
    pub timestamp: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_payloadless_events() {
        assert_eq!(
            ClientEvent::parse(r#"{"event":"request-gps-data"}"#).unwrap(),
            ClientEvent::RequestGpsData
        );
        assert_eq!(
            ClientEvent::parse(r#"{"event":"ping","data":null}"#).unwrap(),
            ClientEvent::Ping
        );
    }

    #[test]
    fn test_parse_update_keeps_raw_payload() {
        let event =
            ClientEvent::parse(r#"{"event":"update-gps-data","data":{"c":{"lat":1},"p":5}}"#)
                .unwrap();
        assert_eq!(
            event,
            ClientEvent::UpdateGpsData(json!({"c": {"lat": 1}, "p": 5}))
        );

        // Missing payload still reaches the handler, which rejects it
        let event = ClientEvent::parse(r#"{"event":"update-gps-data"}"#).unwrap();
        assert_eq!(event, ClientEvent::UpdateGpsData(Value::Null));
    }

    #[test]
    fn test_parse_rejects_unknown_and_garbage() {
        assert_eq!(
            ClientEvent::parse(r#"{"event":"subscribe"}"#).unwrap_err(),
            ProtocolError::UnknownEvent("subscribe".to_string())
        );
        assert!(matches!(
            ClientEvent::parse("not json").unwrap_err(),
            ProtocolError::InvalidFrame(_)
        ));
    }

    #[test]
    fn test_server_event_envelope() {
        let record = GpsRecord::from_value(json!({"c": {"lat": 1}, "p": {"lat": 0}})).unwrap();
        let frame = ServerEvent::GpsDataUpdate(record).to_frame().unwrap();
        let value: Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(value["event"], "gps-data-update");
        assert_eq!(value["data"], json!({"c": {"lat": 1}, "p": {"lat": 0}}));
    }

    #[test]
    fn test_event_names() {
        let record = GpsRecord::from_value(json!({"c": 1, "p": 1})).unwrap();
        let names: Vec<String> = vec![
            ServerEvent::welcome(),
            ServerEvent::GpsData(record.clone()),
            ServerEvent::update_success(record),
            ServerEvent::error("e", "m"),
            ServerEvent::pong(),
        ]
        .iter()
        .map(|e| {
            let v: Value = serde_json::from_str(&e.to_frame().unwrap()).unwrap();
            v["event"].as_str().unwrap().to_string()
        })
        .collect();
        assert_eq!(
            names,
            vec!["welcome", "gps-data", "gps-update-success", "gps-error", "pong"]
        );
    }

    #[test]
    fn test_success_and_error_payloads() {
        let record = GpsRecord::from_value(json!({"c": 1, "p": 2})).unwrap();
        let v: Value =
            serde_json::from_str(&ServerEvent::update_success(record).to_frame().unwrap()).unwrap();
        assert_eq!(v["data"]["success"], true);
        assert_eq!(v["data"]["data"], json!({"c": 1, "p": 2}));

        let v: Value = serde_json::from_str(
            &ServerEvent::error("No GPS data found", "missing").to_frame().unwrap(),
        )
        .unwrap();
        assert_eq!(v["data"], json!({"error": "No GPS data found", "message": "missing"}));
    }
}
