use super::GpsRecord;
use serde_json::Value;
use std::fmt;

/// Errors for stored or incoming GPS payloads
#[derive(Debug, Clone, PartialEq)]
pub enum RecordError {
    /// Payload is not valid JSON
    Malformed(String),
    /// Payload is valid JSON but not an object
    NotAnObject,
    /// A required position field is absent or empty
    MissingField(&'static str),
}

impl fmt::Display for RecordError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordError::Malformed(e) => write!(f, "malformed GPS record: {}", e),
            RecordError::NotAnObject => write!(f, "GPS record must be a JSON object"),
            RecordError::MissingField(field) => {
                write!(f, "GPS record is missing required field '{}'", field)
            }
        }
    }
}

impl std::error::Error for RecordError {}

/// Validates a GPS record.
///
/// Rules:
/// - `c` and `p` must both be present
/// - `null`, `false`, `0` and `""` count as absent
/// - `s` and any extra fields are not checked
pub fn validate(record: &GpsRecord) -> Result<(), RecordError> {
    if !is_present(record.current()) {
        return Err(RecordError::MissingField("c"));
    }
    if !is_present(record.prior()) {
        return Err(RecordError::MissingField("p"));
    }
    Ok(())
}

fn is_present(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Number(n)) => n.as_f64().map_or(true, |v| v != 0.0),
        Some(Value::Array(_)) | Some(Value::Object(_)) => true,
    }
}

#[cfg(test)]
mod validation_tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_falsy_values_are_absent() {
        assert!(!is_present(None));
        assert!(!is_present(Some(&json!(null))));
        assert!(!is_present(Some(&json!(false))));
        assert!(!is_present(Some(&json!(0))));
        assert!(!is_present(Some(&json!(0.0))));
        assert!(!is_present(Some(&json!(""))));
    }

    #[test]
    fn test_truthy_values_are_present() {
        assert!(is_present(Some(&json!({}))));
        assert!(is_present(Some(&json!([]))));
        assert!(is_present(Some(&json!({"lat": 1.0}))));
        assert!(is_present(Some(&json!("x"))));
        assert!(is_present(Some(&json!(-3))));
        assert!(is_present(Some(&json!(true))));
    }
}
