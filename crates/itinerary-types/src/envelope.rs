use base64::Engine;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

const BASE64: base64::engine::GeneralPurpose = base64::engine::general_purpose::STANDARD;

pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Raw payload bytes. Serialized as base64 text.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Payload(Vec<u8>);

impl Payload {
    pub fn from_base64(text: &str) -> Result<Self, base64::DecodeError> {
        BASE64.decode(text).map(Self)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    pub fn to_base64(&self) -> String {
        BASE64.encode(&self.0)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for Payload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Payload({} bytes)", self.0.len())
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl From<&[u8]> for Payload {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Self(text.as_bytes().to_vec())
    }
}

impl Serialize for Payload {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_base64())
    }
}

impl<'de> Deserialize<'de> for Payload {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Payload::from_base64(&text).map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VariableType {
    String,
    DateTime,
    Number,
    Decimal,
    Message,
}

/// A typed value carried alongside the payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    #[serde(rename = "Variable")]
    pub name: String,
    #[serde(rename = "Type")]
    pub kind: VariableType,
    #[serde(rename = "Value", default)]
    pub value: Value,
}

/// The unit passed between activities, locally or across nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MessageEnvelope {
    pub itinerary_id: String,
    #[serde(default)]
    pub last_activity: String,
    #[serde(default)]
    pub next_activity: Option<String>,
    #[serde(default = "default_content_type")]
    pub content_type: String,
    #[serde(rename = "MessageBuffer", default)]
    pub payload: Payload,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub variables: Vec<Variable>,
    #[serde(default)]
    pub is_first_action: bool,
    #[serde(default)]
    pub is_fault: bool,
    #[serde(default)]
    pub is_encrypted: bool,
    #[serde(default)]
    pub fault_code: Option<String>,
    #[serde(default)]
    pub fault_description: Option<String>,
    #[serde(default)]
    pub sender: Option<String>,
    #[serde(default)]
    pub organization_id: String,
    #[serde(default)]
    pub interchange_id: String,
    #[serde(rename = "isDynamicRoute", default)]
    pub is_dynamic_route: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub integration_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracking_level: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub integration_id: Option<String>,
}

fn default_content_type() -> String {
    JSON_CONTENT_TYPE.to_string()
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<Variable>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<Variable>>::deserialize(deserializer)?.unwrap_or_default())
}

impl MessageEnvelope {
    /// Start a new interchange. The originating hop is the first action.
    pub fn new(itinerary_id: impl Into<String>, payload: impl Into<Payload>, content_type: &str) -> Self {
        Self {
            itinerary_id: itinerary_id.into(),
            last_activity: String::new(),
            next_activity: None,
            content_type: content_type.to_string(),
            payload: payload.into(),
            variables: Vec::new(),
            is_first_action: true,
            is_fault: false,
            is_encrypted: false,
            fault_code: None,
            fault_description: None,
            sender: None,
            organization_id: String::new(),
            interchange_id: uuid::Uuid::new_v4().to_string(),
            is_dynamic_route: false,
            integration_name: None,
            environment: None,
            tracking_level: None,
            integration_id: None,
        }
    }

    pub fn is_json(&self) -> bool {
        self.content_type
            .split(';')
            .next()
            .map(|t| t.trim().eq_ignore_ascii_case(JSON_CONTENT_TYPE))
            .unwrap_or(false)
    }

    /// Payload parsed as JSON, when the content type says so and it parses.
    pub fn payload_json(&self) -> Option<Value> {
        if !self.is_json() {
            return None;
        }
        serde_json::from_slice(self.payload.as_bytes()).ok()
    }

    pub fn variable(&self, name: &str) -> Option<&Variable> {
        self.variables.iter().find(|v| v.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_payload_serializes_as_base64() {
        let envelope = MessageEnvelope::new("it-1", "hello", "text/plain");
        let value = serde_json::to_value(&envelope).unwrap();

        assert_eq!(value["MessageBuffer"], json!("aGVsbG8="));
        assert_eq!(value["ItineraryId"], json!("it-1"));
        assert_eq!(value["IsFirstAction"], json!(true));
        assert_eq!(value["isDynamicRoute"], json!(false));
        assert!(value.get("IntegrationName").is_none());
    }

    #[test]
    fn test_binary_payload_survives_serialization() {
        let bytes: Vec<u8> = (0..=255).collect();
        let envelope = MessageEnvelope::new("it-1", bytes.clone(), "application/octet-stream");

        let json = serde_json::to_string(&envelope).unwrap();
        let parsed: MessageEnvelope = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.payload.as_bytes(), bytes.as_slice());
        assert_eq!(Payload::from_base64(&parsed.payload.to_base64()).unwrap(), parsed.payload);
    }

    #[test]
    fn test_parse_minimal_envelope() {
        let parsed: MessageEnvelope = serde_json::from_value(json!({
            "ItineraryId": "it-1",
            "LastActivity": "A",
            "Variables": [{"Variable": "threshold", "Type": "Number", "Value": 10}]
        }))
        .unwrap();

        assert_eq!(parsed.content_type, JSON_CONTENT_TYPE);
        assert!(parsed.payload.is_empty());
        assert!(!parsed.is_first_action);
        assert_eq!(parsed.variable("threshold").unwrap().kind, VariableType::Number);
    }

    #[test]
    fn test_null_variables_parse_as_empty() {
        let parsed: MessageEnvelope = serde_json::from_value(json!({
            "ItineraryId": "it-1",
            "Variables": null
        }))
        .unwrap();
        assert!(parsed.variables.is_empty());
    }

    #[test]
    fn test_invalid_base64_is_rejected() {
        let result: Result<MessageEnvelope, _> = serde_json::from_value(json!({
            "ItineraryId": "it-1",
            "MessageBuffer": "%%%"
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_payload_json() {
        let envelope = MessageEnvelope::new("it-1", r#"{"value":5}"#, "application/json; charset=utf-8");
        assert!(envelope.is_json());
        assert_eq!(envelope.payload_json(), Some(json!({"value": 5})));

        let text = MessageEnvelope::new("it-1", r#"{"value":5}"#, "text/plain");
        assert_eq!(text.payload_json(), None);
    }

    #[test]
    fn test_new_envelopes_get_distinct_interchanges() {
        let a = MessageEnvelope::new("it-1", "x", "text/plain");
        let b = MessageEnvelope::new("it-1", "x", "text/plain");
        assert_ne!(a.interchange_id, b.interchange_id);
    }
}
