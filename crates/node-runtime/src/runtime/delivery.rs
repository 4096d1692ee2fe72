//! Inbound messages, local delivery and completion routing.

use super::NodeRuntime;
use crate::{RuntimeError, RuntimeResult, FAULT_PROCESS_FAILED, FAULT_ROUTING_FAILED, FAULT_SERVICE_NOT_CONFIGURED};
use itinerary_router::successors;
use itinerary_types::{Activity, MessageEnvelope, TrackingState};
use service_host::{ProcessPayload, ServiceEvent, ServiceEventKind};
use tracing::{debug, error, info, warn};

impl NodeRuntime {
    /// A message addressed to a local service arrived through the backend.
    pub(crate) async fn on_queue_message(&mut self, mut envelope: MessageEnvelope, service: String) {
        if envelope.is_encrypted {
            if let Err(e) = self.open(&mut envelope) {
                self.tracker
                    .track_fault(&self.settings, &envelope, &service, e.fault_code(), &e.to_string())
                    .await;
                return;
            }
        }
        self.deliver_local(&service, envelope).await;
    }

    fn open(&self, envelope: &mut MessageEnvelope) -> RuntimeResult<()> {
        let cipher = self.cipher.as_ref().ok_or(RuntimeError::MissingSecret)?;
        let plain = cipher.decrypt(envelope.payload.as_bytes())?;
        envelope.payload = plain.into();
        envelope.is_encrypted = false;
        Ok(())
    }

    /// Run `service` on this node with `envelope`.
    ///
    /// A service that is not running is instantiated when the envelope was
    /// dynamically routed, and the delivery proceeds once. Anything else is
    /// tracked as a fault.
    pub(crate) async fn deliver_local(&mut self, service: &str, mut envelope: MessageEnvelope) {
        envelope.is_first_action = false;

        if let Err(e) = self.ensure_running(service, &mut envelope).await {
            error!(service, error = %e, "service is not configured on this node");
            self.tracker
                .track_fault(
                    &self.settings,
                    &envelope,
                    service,
                    FAULT_SERVICE_NOT_CONFIGURED,
                    &e.to_string(),
                )
                .await;
            return;
        }

        self.tracker
            .track(&self.settings, &envelope, service, TrackingState::Started)
            .await;

        let Some(running) = self.services.get_mut(&envelope.itinerary_id, service) else {
            return;
        };
        let processed = match ProcessPayload::from_envelope(&envelope) {
            Ok(payload) => running.process(payload, &envelope).await,
            Err(e) => Err(e),
        };
        if let Err(e) = processed {
            self.tracker
                .track_fault(&self.settings, &envelope, service, FAULT_PROCESS_FAILED, &e.to_string())
                .await;
        }
    }

    async fn ensure_running(&mut self, service: &str, envelope: &mut MessageEnvelope) -> RuntimeResult<()> {
        if self.services.get(&envelope.itinerary_id, service).is_some() {
            return Ok(());
        }
        if !envelope.is_dynamic_route {
            return Err(RuntimeError::ServiceNotConfigured {
                itinerary_id: envelope.itinerary_id.clone(),
                service: service.to_string(),
            });
        }

        let itinerary = self
            .itineraries
            .iter()
            .find(|i| i.itinerary_id == envelope.itinerary_id)
            .ok_or_else(|| RuntimeError::UnknownItinerary(envelope.itinerary_id.clone()))?;
        let running = self.services.instantiate(itinerary, service)?;
        running.start().await?;
        info!(
            service,
            integration = %running.integration_name(),
            "Started"
        );

        envelope.is_dynamic_route = false;
        Ok(())
    }

    pub(crate) async fn on_service_event(&mut self, event: ServiceEvent) {
        let ServiceEvent { source, kind } = event;
        match kind {
            ServiceEventKind::MessageReceived(envelope) => self.on_completed(envelope).await,
            ServiceEventKind::ReceivedState(state) => {
                if let Err(e) = self
                    .backend
                    .change_state(&state, &self.settings.node_name)
                    .await
                {
                    warn!(service = %source.name, error = %e, "failed to report state");
                }
            }
            ServiceEventKind::Debug(info) => {
                if self.settings.debug {
                    info!(service = %source.name, "DEBUG: {info}");
                }
            }
            ServiceEventKind::ReportLocation(location) => {
                debug!(service = %source.name, location = %location, "location reported");
            }
            ServiceEventKind::Error { id, description } => {
                warn!(service = %source.name, "the error event is deprecated, fail the hop instead");
                error!(service = %source.name, error_id = %id, "{description}");
            }
        }
    }

    /// A service finished a hop. Track it and route the envelope onward.
    async fn on_completed(&mut self, mut envelope: MessageEnvelope) {
        envelope.organization_id = self.settings.organization_id.clone();
        let activity = envelope.last_activity.clone();

        if let Some(code) = envelope.fault_code.clone() {
            let description = envelope.fault_description.clone().unwrap_or_default();
            self.tracker
                .track_fault(&self.settings, &envelope, &activity, &code, &description)
                .await;
            return;
        }

        let state = if envelope.is_first_action {
            TrackingState::Started
        } else {
            TrackingState::Completed
        };
        self.tracker
            .track(&self.settings, &envelope, &activity, state)
            .await;

        envelope.is_first_action = false;
        envelope.sender = Some(self.settings.node_name.clone());
        self.route(envelope).await;
    }

    async fn route(&mut self, envelope: MessageEnvelope) {
        let Some(itinerary) = self
            .itineraries
            .iter()
            .find(|i| i.itinerary_id == envelope.itinerary_id)
        else {
            warn!(itinerary_id = %envelope.itinerary_id, "no itinerary loaded for completed message");
            return;
        };

        let next: Vec<Activity> = match successors(itinerary, &envelope) {
            Ok(next) => next.into_iter().cloned().collect(),
            Err(e) => {
                self.tracker
                    .track_fault(
                        &self.settings,
                        &envelope,
                        &envelope.last_activity,
                        FAULT_ROUTING_FAILED,
                        &e.to_string(),
                    )
                    .await;
                return;
            }
        };

        if next.is_empty() {
            debug!(
                interchange_id = %envelope.interchange_id,
                activity = %envelope.last_activity,
                "no successors"
            );
        }

        for successor in &next {
            match self
                .dispatcher
                .dispatch(&self.settings, successor, &envelope)
                .await
            {
                Ok(deliveries) => {
                    for delivery in deliveries {
                        self.deliver_local(&delivery.service, delivery.envelope)
                            .await;
                    }
                }
                Err(e) => {
                    self.tracker
                        .track_fault(
                            &self.settings,
                            &envelope,
                            successor.name(),
                            e.fault_code(),
                            &e.to_string(),
                        )
                        .await;
                }
            }
        }
    }
}
