use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One named event on the wire: `{"event": "...", "data": ...}` in a text
/// message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Frame {
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

impl Frame {
    pub fn new(event: impl Into<String>, data: Value) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }

    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn decode(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use super::Frame;

    #[test]
    fn missing_data_decodes_as_null() {
        let frame = Frame::decode(r#"{"event":"ping"}"#).unwrap();
        assert_eq!(frame.event, "ping");
        assert_eq!(frame.data, Value::Null);
    }

    #[test]
    fn encodes_event_and_payload() {
        let text = Frame::new("driver_connected", json!(12)).encode().unwrap();
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value, json!({ "event": "driver_connected", "data": 12 }));
    }
}
