//! In-process backend.
//!
//! Submissions addressed to this node come straight back as queue messages.
//! Other nodes are unreachable, so those submissions fail and end up in the
//! persistence store until a real backend replays them.

use crate::{BackendError, BackendEvent, BackendResult, MessagingBackend};
use async_trait::async_trait;
use itinerary_types::{MessageEnvelope, NodeSettings, TrackingRecord};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::broadcast;
use tracing::{debug, info};

pub struct LoopbackBackend {
    node_name: String,
    connected: AtomicBool,
    event_tx: broadcast::Sender<BackendEvent>,
}

impl LoopbackBackend {
    pub fn new(node_name: &str) -> Self {
        let (event_tx, _) = broadcast::channel(256);
        Self {
            node_name: node_name.to_lowercase(),
            connected: AtomicBool::new(false),
            event_tx,
        }
    }

    /// Push an event to subscribers as if the hub had sent it.
    pub fn inject(&self, event: BackendEvent) {
        let _ = self.event_tx.send(event);
    }

    pub fn set_connected(&self, connected: bool) {
        let was = self.connected.swap(connected, Ordering::SeqCst);
        if was != connected {
            self.inject(if connected {
                BackendEvent::Connected
            } else {
                BackendEvent::Disconnected(None)
            });
        }
    }

    fn ensure_connected(&self) -> BackendResult<()> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(BackendError::NotConnected)
        }
    }
}

#[async_trait]
impl MessagingBackend for LoopbackBackend {
    async fn start(&self) -> BackendResult<()> {
        info!(node = %self.node_name, "loopback backend started");
        self.set_connected(true);
        Ok(())
    }

    async fn stop(&self) -> BackendResult<()> {
        self.set_connected(false);
        info!(node = %self.node_name, "loopback backend stopped");
        Ok(())
    }

    async fn submit(&self, envelope: &MessageEnvelope, node: &str, service: &str) -> BackendResult<()> {
        self.ensure_connected()?;
        if !node.eq_ignore_ascii_case(&self.node_name) {
            return Err(BackendError::Unreachable(node.to_string()));
        }
        self.inject(BackendEvent::QueueMessage {
            body: envelope.clone(),
            service: service.to_string(),
        });
        Ok(())
    }

    async fn track(&self, record: &TrackingRecord) -> BackendResult<()> {
        self.ensure_connected()?;
        info!(
            interchange_id = %record.interchange_id,
            activity = %record.last_activity,
            state = %record.state,
            fault_code = record.fault_code.as_deref().unwrap_or(""),
            "tracked"
        );
        Ok(())
    }

    async fn change_state(&self, state: &Value, node: &str) -> BackendResult<()> {
        self.ensure_connected()?;
        debug!(node, state = %state, "reported state");
        Ok(())
    }

    async fn update(&self, settings: &NodeSettings) -> BackendResult<()> {
        debug!(node = %settings.node_name, state = ?settings.state, "settings updated");
        Ok(())
    }

    async fn heartbeat(&self, id: &str) -> BackendResult<()> {
        self.ensure_connected()?;
        self.inject(BackendEvent::HeartbeatAck(id.to_string()));
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn subscribe(&self) -> broadcast::Receiver<BackendEvent> {
        self.event_tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_submit_to_self_loops_back() {
        let backend = LoopbackBackend::new("Node-1");
        let mut events = backend.subscribe();
        backend.start().await.unwrap();
        assert!(matches!(events.recv().await.unwrap(), BackendEvent::Connected));

        let envelope = MessageEnvelope::new("it-1", "x", "text/plain");
        backend.submit(&envelope, "node-1", "B").await.unwrap();

        match events.recv().await.unwrap() {
            BackendEvent::QueueMessage { body, service } => {
                assert_eq!(service, "B");
                assert_eq!(body, envelope);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_submit_to_other_node_is_unreachable() {
        let backend = LoopbackBackend::new("node-1");
        backend.start().await.unwrap();

        let envelope = MessageEnvelope::new("it-1", "x", "text/plain");
        let err = backend.submit(&envelope, "node-2", "B").await.unwrap_err();
        assert!(matches!(err, BackendError::Unreachable(node) if node == "node-2"));
    }

    #[tokio::test]
    async fn test_not_connected_before_start() {
        let backend = LoopbackBackend::new("node-1");
        assert!(!backend.is_connected());

        let envelope = MessageEnvelope::new("it-1", "x", "text/plain");
        assert!(matches!(
            backend.submit(&envelope, "node-1", "B").await,
            Err(BackendError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn test_heartbeat_is_acknowledged() {
        let backend = LoopbackBackend::new("node-1");
        backend.start().await.unwrap();
        let mut events = backend.subscribe();

        backend.heartbeat("hb-1").await.unwrap();
        assert!(matches!(
            events.recv().await.unwrap(),
            BackendEvent::HeartbeatAck(id) if id == "hb-1"
        ));
    }

    #[tokio::test]
    async fn test_stop_emits_disconnected() {
        let backend = LoopbackBackend::new("node-1");
        backend.start().await.unwrap();
        let mut events = backend.subscribe();

        backend.stop().await.unwrap();
        assert!(!backend.is_connected());
        assert!(matches!(
            events.recv().await.unwrap(),
            BackendEvent::Disconnected(None)
        ));
    }
}
