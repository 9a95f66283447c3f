use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

mod validation;

pub use validation::{validate, RecordError};

/// GpsRecord is the latest known position published by a producer.
///
/// The record is a JSON object with `c` (current position), `p` (prior
/// position or path) and `s` (status). Any other producer-supplied fields
/// are carried through untouched, in their original order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GpsRecord(Map<String, Value>);

impl GpsRecord {
    /// Builds a record from an arbitrary JSON value.
    ///
    /// Only checks the shape (must be an object); call [`GpsRecord::validate`]
    /// before accepting it from a producer.
    pub fn from_value(value: Value) -> Result<Self, RecordError> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            _ => Err(RecordError::NotAnObject),
        }
    }

    /// Parses a record from its stored string form.
    pub fn parse(raw: &str) -> Result<Self, RecordError> {
        let value: Value =
            serde_json::from_str(raw).map_err(|e| RecordError::Malformed(e.to_string()))?;
        Self::from_value(value)
    }

    /// Current position (`c`), opaque to the relay
    pub fn current(&self) -> Option<&Value> {
        self.0.get("c")
    }

    /// Prior position or path (`p`), opaque to the relay
    pub fn prior(&self) -> Option<&Value> {
        self.0.get("p")
    }

    /// Status string (`s`), informational only
    pub fn status(&self) -> Option<&str> {
        self.0.get("s").and_then(|v| v.as_str())
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Checks that both `c` and `p` are present.
    pub fn validate(&self) -> Result<(), RecordError> {
        validation::validate(self)
    }

    /// Canonical serialized form: compact JSON in field insertion order.
    ///
    /// Two records are the same position update iff their canonical forms
    /// are byte-for-byte identical.
    pub fn canonical(&self) -> Result<String, RecordError> {
        serde_json::to_string(&self.0).map_err(|e| RecordError::Malformed(e.to_string()))
    }
}
