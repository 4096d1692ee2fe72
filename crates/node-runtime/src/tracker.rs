//! Lineage tracking.

use itinerary_types::{
    MessageEnvelope, NodeSettings, Payload, PersistedRecord, TrackingRecord, TrackingState,
    REDACTED_PAYLOAD,
};
use messaging_backend::MessagingBackend;
use persistence_store::PersistenceStore;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Emits one [`TrackingRecord`] per hop, online through the backend or
/// offline into the persistence store.
#[derive(Clone)]
pub struct LineageTracker {
    backend: Arc<dyn MessagingBackend>,
    store: Arc<PersistenceStore>,
}

impl LineageTracker {
    pub fn new(backend: Arc<dyn MessagingBackend>, store: Arc<PersistenceStore>) -> Self {
        Self { backend, store }
    }

    /// Record a Started or Completed hop. No-op when tracking is disabled.
    pub async fn track(
        &self,
        settings: &NodeSettings,
        envelope: &MessageEnvelope,
        activity: &str,
        state: TrackingState,
    ) {
        if !settings.enable_tracking {
            return;
        }
        let record = self.record(settings, envelope, activity, state);
        self.send(record).await;
    }

    /// Record a failed hop. Faults are tracked even when tracking is off.
    pub async fn track_fault(
        &self,
        settings: &NodeSettings,
        envelope: &MessageEnvelope,
        activity: &str,
        code: &str,
        description: &str,
    ) {
        warn!(
            interchange_id = %envelope.interchange_id,
            activity,
            fault_code = code,
            "{description}"
        );

        let mut record = self.record(settings, envelope, activity, TrackingState::Failed);
        record.is_fault = true;
        record.fault_code = Some(code.to_string());
        record.fault_description = Some(description.to_string());
        record.variables = None;
        self.send(record).await;
    }

    fn record(
        &self,
        settings: &NodeSettings,
        envelope: &MessageEnvelope,
        activity: &str,
        state: TrackingState,
    ) -> TrackingRecord {
        let mut record = TrackingRecord::for_hop(envelope, activity, &settings.node_name, state);
        if record.organization_id.is_empty() {
            record.organization_id = settings.organization_id.clone();
        }
        if settings.use_encryption {
            record.message = Payload::from(REDACTED_PAYLOAD).to_base64();
        }
        record
    }

    async fn send(&self, record: TrackingRecord) {
        if self.backend.is_connected() {
            match self.backend.track(&record).await {
                Ok(()) => {
                    debug!(
                        interchange_id = %record.interchange_id,
                        activity = %record.last_activity,
                        state = %record.state,
                        "tracked hop"
                    );
                    return;
                }
                Err(e) => warn!(error = %e, "track failed, persisting record"),
            }
        }

        if let Err(e) = self.store.persist(&PersistedRecord::Tracking(record)).await {
            error!(error = %e, "failed to persist tracking record");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::harness::{settings, RecordingBackend};
    use tempfile::tempdir;

    async fn tracker(backend: Arc<RecordingBackend>) -> (LineageTracker, Arc<PersistenceStore>, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let store = Arc::new(PersistenceStore::open(dir.path()).await.unwrap());
        (LineageTracker::new(backend, store.clone()), store, dir)
    }

    #[tokio::test]
    async fn test_disabled_tracking_sends_nothing() {
        let backend = Arc::new(RecordingBackend::connected());
        let (tracker, store, _dir) = tracker(backend.clone()).await;
        let mut settings = settings("node-1");
        settings.enable_tracking = false;

        let envelope = MessageEnvelope::new("it-1", "x", "text/plain");
        tracker
            .track(&settings, &envelope, "A", TrackingState::Started)
            .await;

        assert!(backend.tracked().is_empty());
        assert!(store.is_empty().await.unwrap());
    }

    #[tokio::test]
    async fn test_faults_are_tracked_even_when_disabled() {
        let backend = Arc::new(RecordingBackend::connected());
        let (tracker, _store, _dir) = tracker(backend.clone()).await;
        let mut settings = settings("node-1");
        settings.enable_tracking = false;

        let envelope = MessageEnvelope::new("it-1", "x", "text/plain");
        tracker
            .track_fault(&settings, &envelope, "A", "90003", "boom")
            .await;

        let tracked = backend.tracked();
        assert_eq!(tracked.len(), 1);
        assert!(tracked[0].is_fault);
        assert_eq!(tracked[0].state, TrackingState::Failed);
        assert_eq!(tracked[0].fault_code.as_deref(), Some("90003"));
        assert_eq!(tracked[0].variables, None);
    }

    #[tokio::test]
    async fn test_payload_is_redacted_when_encrypting() {
        let backend = Arc::new(RecordingBackend::connected());
        let (tracker, _store, _dir) = tracker(backend.clone()).await;
        let mut settings = settings("node-1");
        settings.use_encryption = true;

        let envelope = MessageEnvelope::new("it-1", "secret reading", "text/plain");
        tracker
            .track(&settings, &envelope, "A", TrackingState::Completed)
            .await;

        let record = &backend.tracked()[0];
        let shown = Payload::from_base64(&record.message).unwrap();
        assert_eq!(shown.as_bytes(), REDACTED_PAYLOAD.as_bytes());
    }

    #[tokio::test]
    async fn test_offline_tracking_is_persisted() {
        let backend = Arc::new(RecordingBackend::disconnected());
        let (tracker, store, _dir) = tracker(backend.clone()).await;

        let envelope = MessageEnvelope::new("it-1", "x", "text/plain");
        tracker
            .track(&settings("node-1"), &envelope, "A", TrackingState::Started)
            .await;

        assert!(backend.tracked().is_empty());
        let keys = store.list().await.unwrap();
        assert_eq!(keys.len(), 1);
        assert!(matches!(
            store.read(&keys[0]).await.unwrap(),
            PersistedRecord::Tracking(record) if record.last_activity == "A" && record.node == "node-1"
        ));
    }
}
