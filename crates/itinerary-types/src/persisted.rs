use crate::{MessageEnvelope, TrackingRecord};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    Message,
    Tracking,
}

/// A submission that could not be handed to the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedMessage {
    pub node: String,
    pub service: String,
    pub message: MessageEnvelope,
}

/// What the node buffers while it cannot reach the backend.
#[derive(Debug, Clone, PartialEq)]
pub enum PersistedRecord {
    Message(PersistedMessage),
    Tracking(TrackingRecord),
}

impl PersistedRecord {
    pub fn message(node: &str, service: &str, message: MessageEnvelope) -> Self {
        Self::Message(PersistedMessage {
            node: node.to_string(),
            service: service.to_string(),
            message,
        })
    }

    pub fn kind(&self) -> RecordKind {
        match self {
            Self::Message(_) => RecordKind::Message,
            Self::Tracking(_) => RecordKind::Tracking,
        }
    }

    /// Serialized body. The kind is not part of the body.
    pub fn to_json(&self) -> serde_json::Result<Vec<u8>> {
        match self {
            Self::Message(m) => serde_json::to_vec(m),
            Self::Tracking(t) => serde_json::to_vec(t),
        }
    }

    pub fn from_json(kind: RecordKind, body: &[u8]) -> serde_json::Result<Self> {
        match kind {
            RecordKind::Message => serde_json::from_slice(body).map(Self::Message),
            RecordKind::Tracking => serde_json::from_slice(body).map(Self::Tracking),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TrackingState;

    #[test]
    fn test_message_body_layout() {
        let envelope = MessageEnvelope::new("it-1", "x", "text/plain");
        let record = PersistedRecord::message("node-2", "B", envelope);

        let body: serde_json::Value = serde_json::from_slice(&record.to_json().unwrap()).unwrap();
        assert_eq!(body["node"], "node-2");
        assert_eq!(body["service"], "B");
        assert_eq!(body["message"]["ItineraryId"], "it-1");
    }

    #[test]
    fn test_body_parses_back_per_kind() {
        let envelope = MessageEnvelope::new("it-1", "x", "text/plain");
        let tracking = PersistedRecord::Tracking(TrackingRecord::for_hop(
            &envelope,
            "A",
            "node-1",
            TrackingState::Started,
        ));

        let body = tracking.to_json().unwrap();
        assert_eq!(
            PersistedRecord::from_json(RecordKind::Tracking, &body).unwrap(),
            tracking
        );
        assert!(PersistedRecord::from_json(RecordKind::Message, &body).is_err());
    }
}
