//! Wire envelope: `{ "type": string, "payload": object, "timestamp": number }`

use crate::traits::{Frame, LiveSocketError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

/// The unit of communication on the channel
///
/// Immutable once constructed. `type` is never empty and `payload` is always
/// an object (possibly empty). `timestamp` is the sender's clock in
/// milliseconds; it is advisory and never used for ordering.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    payload: Map<String, Value>,
    timestamp: i64,
}

impl Envelope {
    /// Build an outbound envelope stamped with the current time
    pub fn new(kind: impl Into<String>, payload: Map<String, Value>) -> Result<Self> {
        Self::with_timestamp(kind, payload, chrono::Utc::now().timestamp_millis())
    }

    /// Build an envelope with an explicit sender timestamp
    pub fn with_timestamp(
        kind: impl Into<String>,
        payload: Map<String, Value>,
        timestamp: i64,
    ) -> Result<Self> {
        let kind = kind.into();
        if kind.trim().is_empty() {
            return Err(LiveSocketError::MalformedEnvelope(
                "envelope type must not be empty".to_string(),
            ));
        }
        Ok(Self {
            kind,
            payload,
            timestamp,
        })
    }

    /// Build an outbound envelope from any payload that serializes to an object
    pub fn from_payload<T: Serialize + ?Sized>(
        kind: impl Into<String>,
        payload: &T,
    ) -> Result<Self> {
        match serde_json::to_value(payload) {
            Ok(Value::Object(map)) => Self::new(kind, map),
            Ok(other) => Err(LiveSocketError::Parse(format!(
                "payload must serialize to an object, got {}",
                json_kind(&other)
            ))),
            Err(e) => Err(LiveSocketError::Parse(e.to_string())),
        }
    }

    /// Decode an inbound envelope
    ///
    /// A missing `payload` decodes as an empty object and a missing
    /// `timestamp` as 0; a missing or empty `type` is rejected.
    pub fn decode(text: &str) -> Result<Self> {
        let value: Value =
            serde_json::from_str(text).map_err(|e| LiveSocketError::Parse(e.to_string()))?;

        let Value::Object(mut object) = value else {
            return Err(LiveSocketError::MalformedEnvelope(
                "envelope must be a JSON object".to_string(),
            ));
        };

        let kind = match object.remove("type") {
            Some(Value::String(kind)) if !kind.trim().is_empty() => kind,
            Some(_) => {
                return Err(LiveSocketError::MalformedEnvelope(
                    "envelope type must be a non-empty string".to_string(),
                ))
            }
            None => {
                return Err(LiveSocketError::MalformedEnvelope(
                    "envelope has no type".to_string(),
                ))
            }
        };

        let payload = match object.remove("payload") {
            Some(Value::Object(map)) => map,
            None | Some(Value::Null) => Map::new(),
            Some(other) => {
                return Err(LiveSocketError::MalformedEnvelope(format!(
                    "payload of '{}' must be an object, got {}",
                    kind,
                    json_kind(&other)
                )))
            }
        };

        let timestamp = object
            .get("timestamp")
            .and_then(|ts| ts.as_i64().or_else(|| ts.as_f64().map(|f| f as i64)))
            .unwrap_or(0);

        Ok(Self {
            kind,
            payload,
            timestamp,
        })
    }

    /// Decode a transport frame; binary frames must hold UTF-8 JSON
    pub fn from_frame(frame: &Frame) -> Result<Self> {
        match frame {
            Frame::Text(text) => Self::decode(text),
            Frame::Binary(bytes) => {
                let text = std::str::from_utf8(bytes)
                    .map_err(|e| LiveSocketError::Parse(e.to_string()))?;
                Self::decode(text)
            }
        }
    }

    pub fn encode(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| LiveSocketError::Parse(e.to_string()))
    }

    pub fn to_frame(&self) -> Result<Frame> {
        self.encode().map(Frame::Text)
    }

    /// The `type` tag
    #[inline]
    pub fn kind(&self) -> &str {
        &self.kind
    }

    #[inline]
    pub fn payload(&self) -> &Map<String, Value> {
        &self.payload
    }

    #[inline]
    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    /// Deserialize the payload into a typed struct
    pub fn payload_as<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(Value::Object(self.payload.clone())).map_err(|e| {
            LiveSocketError::Parse(format!("invalid '{}' payload: {}", self.kind, e))
        })
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_encode_uses_wire_field_names() {
        let mut payload = Map::new();
        payload.insert("text".into(), json!("hello"));
        let env = Envelope::with_timestamp("greeting", payload, 1_700_000_000_000).unwrap();

        let value: Value = serde_json::from_str(&env.encode().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({ "type": "greeting", "payload": { "text": "hello" }, "timestamp": 1_700_000_000_000i64 })
        );
    }

    #[test]
    fn test_empty_type_rejected() {
        assert!(matches!(
            Envelope::new("  ", Map::new()),
            Err(LiveSocketError::MalformedEnvelope(_))
        ));
    }

    #[test]
    fn test_decode_missing_type_is_malformed() {
        let result = Envelope::decode(r#"{"payload": {"id": "1"}, "timestamp": 5}"#);
        assert!(matches!(result, Err(LiveSocketError::MalformedEnvelope(_))));
    }

    #[test]
    fn test_decode_defaults_payload_and_timestamp() {
        let env = Envelope::decode(r#"{"type": "get-orders-error"}"#).unwrap();
        assert_eq!(env.kind(), "get-orders-error");
        assert!(env.payload().is_empty());
        assert_eq!(env.timestamp(), 0);
    }

    #[test]
    fn test_decode_rejects_non_object_payload() {
        let result = Envelope::decode(r#"{"type": "new-order-event", "payload": [1, 2]}"#);
        assert!(matches!(result, Err(LiveSocketError::MalformedEnvelope(_))));
    }

    #[test]
    fn test_decode_garbage_is_parse_error() {
        assert!(matches!(
            Envelope::decode("not json"),
            Err(LiveSocketError::Parse(_))
        ));
    }

    #[test]
    fn test_from_payload_requires_object() {
        let result = Envelope::from_payload("greeting", &vec![1, 2, 3]);
        assert!(matches!(result, Err(LiveSocketError::Parse(_))));
    }

    #[test]
    fn test_new_stamps_sender_clock() {
        let before = chrono::Utc::now().timestamp_millis();
        let env = Envelope::new("greeting", Map::new()).unwrap();
        assert!(env.timestamp() >= before);
    }

    #[test]
    fn test_binary_frame_decodes_as_utf8_json() {
        let frame = Frame::Binary(br#"{"type":"greeting","payload":{"text":"hi"}}"#.to_vec());
        let env = Envelope::from_frame(&frame).unwrap();
        assert_eq!(env.kind(), "greeting");
        assert_eq!(env.payload()["text"], json!("hi"));
    }
}
