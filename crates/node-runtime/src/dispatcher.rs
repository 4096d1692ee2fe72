//! Delivery of routed envelopes.

use crate::RuntimeResult;
use itinerary_router::{render_host, split_destinations};
use itinerary_types::{Activity, MessageEnvelope, NodeSettings, PersistedRecord};
use messaging_backend::MessagingBackend;
use node_config_and_utils::PayloadCipher;
use persistence_store::PersistenceStore;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// An envelope addressed to a service on this node. The runtime owns the
/// services, so local deliveries are handed back to it.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalDelivery {
    pub service: String,
    pub envelope: MessageEnvelope,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Accepted by the backend.
    Sent,
    /// Written to the persistence store for a later replay.
    Persisted,
    /// Neither sent nor persisted.
    Lost,
}

/// Resolves successor destinations and hands envelopes to the backend.
#[derive(Clone)]
pub struct Dispatcher {
    backend: Arc<dyn MessagingBackend>,
    store: Arc<PersistenceStore>,
    cipher: Option<Arc<PayloadCipher>>,
}

impl Dispatcher {
    pub fn new(
        backend: Arc<dyn MessagingBackend>,
        store: Arc<PersistenceStore>,
        cipher: Option<Arc<PayloadCipher>>,
    ) -> Self {
        Self {
            backend,
            store,
            cipher,
        }
    }

    /// Deliver `envelope` to `successor` on every node its host resolves to.
    ///
    /// Remote nodes are submitted to directly. Deliveries for this node are
    /// returned for the caller to run. A destination that differs from the
    /// configured host marks the envelope as a dynamic route.
    pub async fn dispatch(
        &self,
        settings: &NodeSettings,
        successor: &Activity,
        envelope: &MessageEnvelope,
    ) -> RuntimeResult<Vec<LocalDelivery>> {
        let destination = render_host(successor, envelope)?;
        let configured = successor.host().unwrap_or_default();

        let mut routed = envelope.clone();
        routed.is_dynamic_route = destination != configured;
        routed.next_activity = Some(successor.name().to_string());

        let mut local = Vec::new();
        for node in split_destinations(&destination) {
            if node.eq_ignore_ascii_case(&settings.node_name) {
                local.push(LocalDelivery {
                    service: successor.name().to_string(),
                    envelope: routed.clone(),
                });
                continue;
            }

            let outbound = self.seal(settings, &routed);
            self.submit(&outbound, &node.to_lowercase(), successor.name())
                .await;
        }
        Ok(local)
    }

    /// Hand an envelope to the backend, falling back to the persistence
    /// store when the backend is offline or refuses it. Never fails.
    pub async fn submit(&self, envelope: &MessageEnvelope, node: &str, service: &str) -> SubmitOutcome {
        if self.backend.is_connected() {
            match self.backend.submit(envelope, node, service).await {
                Ok(()) => {
                    info!(
                        interchange_id = %envelope.interchange_id,
                        node,
                        service,
                        dynamic = envelope.is_dynamic_route,
                        "submitted message"
                    );
                    return SubmitOutcome::Sent;
                }
                Err(e) => warn!(node, service, error = %e, "submit failed, persisting message"),
            }
        } else {
            debug!(node, service, "backend offline, persisting message");
        }

        let record = PersistedRecord::message(node, service, envelope.clone());
        match self.store.persist(&record).await {
            Ok(key) => {
                debug!(key = %key, node, service, "message persisted");
                SubmitOutcome::Persisted
            }
            Err(e) => {
                error!(node, service, error = %e, "failed to persist message");
                SubmitOutcome::Lost
            }
        }
    }

    fn seal(&self, settings: &NodeSettings, envelope: &MessageEnvelope) -> MessageEnvelope {
        let mut outbound = envelope.clone();
        if !settings.use_encryption || outbound.is_encrypted {
            return outbound;
        }
        if let Some(cipher) = &self.cipher {
            outbound.payload = cipher.encrypt(outbound.payload.as_bytes()).into();
            outbound.is_encrypted = true;
        }
        outbound
    }
}
