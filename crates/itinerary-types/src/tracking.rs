use crate::{MessageEnvelope, Variable};
use serde::{Deserialize, Serialize};

/// Text placed in a tracking record instead of the payload when the node
/// encrypts payloads.
pub const REDACTED_PAYLOAD: &str = "[ENCRYPTED]";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrackingState {
    Started,
    Completed,
    Failed,
}

impl std::fmt::Display for TrackingState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Started => "Started",
            Self::Completed => "Completed",
            Self::Failed => "Failed",
        };
        f.write_str(s)
    }
}

/// Audit entry for one hop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TrackingRecord {
    pub message_id: String,
    /// Base64 payload, or the base64 redaction marker.
    #[serde(rename = "_message", default)]
    pub message: String,
    #[serde(default)]
    pub content_type: String,
    pub itinerary_id: String,
    pub last_activity: String,
    #[serde(default)]
    pub next_activity: Option<String>,
    pub node: String,
    #[serde(default)]
    pub organization_id: String,
    #[serde(default)]
    pub interchange_id: String,
    #[serde(default)]
    pub integration_name: Option<String>,
    #[serde(default)]
    pub environment: Option<String>,
    #[serde(default)]
    pub tracking_level: Option<String>,
    #[serde(default)]
    pub integration_id: Option<String>,
    pub time_stamp: String,
    pub state: TrackingState,
    #[serde(default)]
    pub is_fault: bool,
    #[serde(default)]
    pub is_encrypted: bool,
    #[serde(default)]
    pub is_first_action: bool,
    #[serde(default)]
    pub fault_code: Option<String>,
    #[serde(default)]
    pub fault_description: Option<String>,
    #[serde(default)]
    pub variables: Option<Vec<Variable>>,
}

impl TrackingRecord {
    /// Record for `envelope` as seen by `last_activity` on `node`.
    pub fn for_hop(
        envelope: &MessageEnvelope,
        last_activity: &str,
        node: &str,
        state: TrackingState,
    ) -> Self {
        Self {
            message_id: uuid::Uuid::new_v4().to_string(),
            message: envelope.payload.to_base64(),
            content_type: envelope.content_type.clone(),
            itinerary_id: envelope.itinerary_id.clone(),
            last_activity: last_activity.to_string(),
            next_activity: None,
            node: node.to_string(),
            organization_id: envelope.organization_id.clone(),
            interchange_id: envelope.interchange_id.clone(),
            integration_name: envelope.integration_name.clone(),
            environment: envelope.environment.clone(),
            tracking_level: envelope.tracking_level.clone(),
            integration_id: envelope.integration_id.clone(),
            time_stamp: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            state,
            is_fault: false,
            is_encrypted: envelope.is_encrypted,
            is_first_action: envelope.is_first_action && state != TrackingState::Completed,
            fault_code: envelope.fault_code.clone(),
            fault_description: envelope.fault_description.clone(),
            variables: Some(envelope.variables.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_for_hop_copies_lineage() {
        let mut envelope = MessageEnvelope::new("it-1", "payload", "text/plain");
        envelope.organization_id = "org-1".to_string();
        envelope.integration_name = Some("Telemetry".to_string());

        let record = TrackingRecord::for_hop(&envelope, "A", "node-1", TrackingState::Started);

        assert_eq!(record.itinerary_id, "it-1");
        assert_eq!(record.interchange_id, envelope.interchange_id);
        assert_eq!(record.organization_id, "org-1");
        assert_eq!(record.integration_name.as_deref(), Some("Telemetry"));
        assert_eq!(record.message, envelope.payload.to_base64());
        assert!(record.is_first_action);
        assert!(!record.is_fault);
        assert!(record.time_stamp.ends_with('Z'));
    }

    #[test]
    fn test_completed_hop_is_never_first_action() {
        let envelope = MessageEnvelope::new("it-1", "payload", "text/plain");
        let record = TrackingRecord::for_hop(&envelope, "A", "node-1", TrackingState::Completed);
        assert!(!record.is_first_action);
    }

    #[test]
    fn test_wire_names() {
        let envelope = MessageEnvelope::new("it-1", "p", "text/plain");
        let record = TrackingRecord::for_hop(&envelope, "A", "node-1", TrackingState::Failed);
        let value = serde_json::to_value(&record).unwrap();

        assert_eq!(value["State"], "Failed");
        assert_eq!(value["LastActivity"], "A");
        assert!(value.get("_message").is_some());
        assert!(value.get("TimeStamp").is_some());
    }
}
