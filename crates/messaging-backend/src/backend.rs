use crate::BackendResult;
use async_trait::async_trait;
use itinerary_types::{
    HubAction, Itinerary, MessageEnvelope, NodeSettings, NodeState, SignInResponse,
    TrackingRecord,
};
use serde_json::Value;
use tokio::sync::broadcast;

/// Events pushed by the backend.
#[derive(Debug, Clone)]
pub enum BackendEvent {
    Connected,
    Disconnected(Option<String>),
    SignInComplete(SignInResponse),
    ItineraryUpdated(Itinerary),
    StateChanged(NodeState),
    TrackingChanged(bool),
    DebugChanged(bool),
    /// Desired/reported state document.
    StateReceived(Value),
    /// A message addressed to a service on this node.
    QueueMessage {
        body: MessageEnvelope,
        service: String,
    },
    ReceivedQueueError(String),
    SubmitQueueError(String),
    QueueDebug(String),
    Action(HubAction),
    HeartbeatAck(String),
}

/// Outbound side of a messaging backend.
///
/// `submit` and `track` are fire-and-forget: `Ok` means the backend accepted
/// the hand-off, not that the receiver processed it.
#[async_trait]
pub trait MessagingBackend: Send + Sync {
    async fn start(&self) -> BackendResult<()>;

    async fn stop(&self) -> BackendResult<()>;

    async fn submit(&self, envelope: &MessageEnvelope, node: &str, service: &str)
        -> BackendResult<()>;

    async fn track(&self, record: &TrackingRecord) -> BackendResult<()>;

    async fn change_state(&self, state: &Value, node: &str) -> BackendResult<()>;

    async fn update(&self, settings: &NodeSettings) -> BackendResult<()>;

    /// Liveness ping. The acknowledgment arrives as [`BackendEvent::HeartbeatAck`].
    async fn heartbeat(&self, id: &str) -> BackendResult<()>;

    fn is_connected(&self) -> bool;

    fn subscribe(&self) -> broadcast::Receiver<BackendEvent>;
}
