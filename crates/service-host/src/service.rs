use crate::{ServiceError, ServiceResult};
use async_trait::async_trait;
use itinerary_types::{ActivityConfig, MessageEnvelope, Payload};
use serde_json::Value;
use tokio::sync::mpsc;

/// Payload handed to [`MicroService::process`]: parsed JSON for JSON
/// content, UTF-8 text otherwise. The raw bytes stay on the envelope.
///
/// JSON content that does not parse is an error, not text.
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessPayload {
    Json(Value),
    Text(String),
}

impl ProcessPayload {
    pub fn from_envelope(envelope: &MessageEnvelope) -> ServiceResult<Self> {
        if envelope.is_json() {
            return serde_json::from_slice(envelope.payload.as_bytes())
                .map(Self::Json)
                .map_err(|e| ServiceError::InvalidPayload(e.to_string()));
        }
        Ok(Self::Text(
            String::from_utf8_lossy(envelope.payload.as_bytes()).into_owned(),
        ))
    }
}

/// An activity implementation.
///
/// Implementations must not hold on to envelopes between calls.
#[async_trait]
pub trait MicroService: Send {
    fn init(&mut self, config: &ActivityConfig) -> ServiceResult<()>;

    async fn start(&mut self) -> ServiceResult<()>;

    async fn stop(&mut self) -> ServiceResult<()>;

    async fn process(&mut self, payload: ProcessPayload, envelope: &MessageEnvelope)
        -> ServiceResult<()>;
}

/// Identity of a running service.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServiceKey {
    pub itinerary_id: String,
    pub name: String,
}

#[derive(Debug, Clone)]
pub enum ServiceEventKind {
    /// The service finished a hop (or originated a message).
    MessageReceived(MessageEnvelope),
    ReceivedState(Value),
    Debug(String),
    ReportLocation(Value),
    /// Superseded by faulted envelopes through `MessageReceived`.
    Error { id: String, description: String },
}

#[derive(Debug, Clone)]
pub struct ServiceEvent {
    pub source: ServiceKey,
    pub kind: ServiceEventKind,
}

/// Handle a service uses to talk back to the node.
#[derive(Debug, Clone)]
pub struct ServiceContext {
    key: ServiceKey,
    node_name: String,
    integration_name: String,
    events: mpsc::UnboundedSender<ServiceEvent>,
}

impl ServiceContext {
    pub fn new(
        key: ServiceKey,
        node_name: &str,
        integration_name: &str,
        events: mpsc::UnboundedSender<ServiceEvent>,
    ) -> Self {
        Self {
            key,
            node_name: node_name.to_string(),
            integration_name: integration_name.to_string(),
            events,
        }
    }

    pub fn key(&self) -> &ServiceKey {
        &self.key
    }

    pub fn name(&self) -> &str {
        &self.key.name
    }

    pub fn node_name(&self) -> &str {
        &self.node_name
    }

    fn emit(&self, kind: ServiceEventKind) -> ServiceResult<()> {
        self.events
            .send(ServiceEvent {
                source: self.key.clone(),
                kind,
            })
            .map_err(|_| ServiceError::EventChannelClosed)
    }

    /// Start a new interchange from this service.
    pub fn originate(&self, payload: impl Into<Payload>, content_type: &str) -> ServiceResult<()> {
        let mut envelope =
            MessageEnvelope::new(self.key.itinerary_id.clone(), payload, content_type);
        envelope.last_activity = self.key.name.clone();
        envelope.integration_name = Some(self.integration_name.clone());
        self.emit(ServiceEventKind::MessageReceived(envelope))
    }

    /// Finish a hop with a new payload.
    pub fn complete(
        &self,
        envelope: &MessageEnvelope,
        payload: impl Into<Payload>,
        content_type: &str,
    ) -> ServiceResult<()> {
        let mut next = envelope.clone();
        next.payload = payload.into();
        next.content_type = content_type.to_string();
        next.is_encrypted = false;
        self.submit(next)
    }

    /// Finish a hop by reporting a fault instead of a result.
    pub fn fail(&self, envelope: &MessageEnvelope, code: &str, description: &str) -> ServiceResult<()> {
        let mut faulted = envelope.clone();
        faulted.is_fault = true;
        faulted.fault_code = Some(code.to_string());
        faulted.fault_description = Some(description.to_string());
        self.submit(faulted)
    }

    /// Raise `OnMessageReceived` with an envelope as-is, stamped with this
    /// service as the last activity.
    pub fn submit(&self, mut envelope: MessageEnvelope) -> ServiceResult<()> {
        envelope.last_activity = self.key.name.clone();
        self.emit(ServiceEventKind::MessageReceived(envelope))
    }

    pub fn received_state(&self, state: Value) -> ServiceResult<()> {
        self.emit(ServiceEventKind::ReceivedState(state))
    }

    pub fn debug(&self, info: impl Into<String>) -> ServiceResult<()> {
        self.emit(ServiceEventKind::Debug(info.into()))
    }

    pub fn report_location(&self, location: Value) -> ServiceResult<()> {
        self.emit(ServiceEventKind::ReportLocation(location))
    }

    #[deprecated(note = "complete the hop with `fail` instead")]
    pub fn error(&self, id: &str, description: &str) -> ServiceResult<()> {
        self.emit(ServiceEventKind::Error {
            id: id.to_string(),
            description: description.to_string(),
        })
    }
}
