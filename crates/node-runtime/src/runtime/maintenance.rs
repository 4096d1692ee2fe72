//! Sign-in, itinerary and state changes, and maintenance actions.

use super::{Command, NodeRuntime, RuntimeExit};
use crate::FAULT_PROCESS_FAILED;
use itinerary_types::{
    HubAction, Itinerary, MaintenanceAction, MessageEnvelope, MsbAction, NodeState,
    SignInResponse, TrackingState, JSON_CONTENT_TYPE, STATE_RECEIVE_ADAPTER_TYPE,
};
use serde_json::Value;
use service_host::{ProcessPayload, ServiceKey};
use tracing::{error, info, warn};

impl NodeRuntime {
    pub(crate) async fn on_sign_in(&mut self, response: SignInResponse) {
        self.settings.state = response.state;
        self.settings.debug = response.debug;
        self.settings.enable_tracking = response.enable_tracking;
        self.settings.tags = response.tags;
        if let Some(organization_id) = response.organization_id {
            self.settings.organization_id = organization_id;
        }
        self.services.set_tags(self.settings.tags.clone());
        self.itineraries = response.itineraries;

        info!(
            node = %self.settings.node_name,
            state = ?self.settings.state,
            itineraries = self.itineraries.len(),
            "sign-in complete"
        );

        if self.signed_in {
            if let Err(e) = self.backend.update(&self.settings).await {
                warn!(error = %e, "failed to update backend settings");
            }
        } else {
            self.signed_in = true;
            if let Err(e) = self.backend.start().await {
                error!(error = %e, "failed to start messaging backend");
            }
        }

        if self.settings.state.is_active() {
            self.reload_services().await;
        } else {
            self.services.clear().await;
            info!("node is inactive, services not started");
        }
        self.schedule(self.options.replay_delay, Command::Replay);
    }

    /// Replace the itinerary with the same id, or add it, then reload.
    pub(crate) async fn on_itinerary_updated(&mut self, itinerary: Itinerary) {
        info!(
            itinerary_id = %itinerary.itinerary_id,
            integration = %itinerary.integration_name,
            "itinerary updated"
        );
        let existing = self
            .itineraries
            .iter()
            .position(|i| i.itinerary_id == itinerary.itinerary_id);
        match existing {
            Some(idx) => self.itineraries[idx] = itinerary,
            None => self.itineraries.push(itinerary),
        }

        if self.settings.state.is_active() {
            self.reload_services().await;
        } else {
            self.services.stop_all().await;
        }
        self.schedule(self.options.replay_delay, Command::Replay);
    }

    pub(crate) async fn on_state_changed(&mut self, state: NodeState) {
        info!(state = ?state, "state changed");
        self.settings.state = state;
        if state.is_active() {
            self.reload_services().await;
        } else {
            self.services.stop_all().await;
        }
        if let Err(e) = self.backend.update(&self.settings).await {
            warn!(error = %e, "failed to update backend settings");
        }
    }

    /// Drop every service, load the activities assigned to this node from
    /// every itinerary and start them.
    pub(crate) async fn reload_services(&mut self) {
        self.services.clear().await;

        for idx in 0..self.itineraries.len() {
            let report = self.services.load_assigned(&mut self.itineraries[idx]);
            let itinerary = &self.itineraries[idx];
            info!(
                itinerary_id = %itinerary.itinerary_id,
                integration = %itinerary.integration_name,
                loaded = report.loaded.len(),
                disabled = report.disabled.len(),
                failed = report.failed.len(),
                "itinerary loaded"
            );
            for (name, reason) in &report.failed {
                warn!(service = %name, reason = %reason, "service failed to load");
            }
        }

        let started = self.services.start_all().await;
        info!(started, total = self.services.len(), "services started");
        for service in self.services.iter() {
            let status = if service.is_started() { "Started" } else { "Stopped" };
            info!(
                service = %service.name(),
                status,
                integration = %service.integration_name(),
                "service status"
            );
        }
    }

    /// A desired/reported state document arrived from the hub.
    ///
    /// An unacknowledged `msbaction` is echoed back on the reported side
    /// and runs after the settle delay. Any other document goes to the
    /// local state receive adapters.
    pub(crate) async fn on_state_received(&mut self, document: Value) {
        if let Some(action) = MsbAction::pending(&document) {
            info!(action_id = %action.id, action = ?action.action, "maintenance action received");
            if let Err(e) = self
                .backend
                .change_state(&action.acknowledgement(), &self.settings.node_name)
                .await
            {
                warn!(error = %e, "failed to acknowledge maintenance action");
            }
            self.schedule(self.options.action_delay, Command::Maintenance(action));
            return;
        }

        let receivers: Vec<ServiceKey> = self
            .services
            .by_base_type_mut(STATE_RECEIVE_ADAPTER_TYPE)
            .map(|s| s.key().clone())
            .collect();

        for key in receivers {
            let mut envelope = MessageEnvelope::new(
                key.itinerary_id.clone(),
                document.to_string().into_bytes(),
                JSON_CONTENT_TYPE,
            );
            envelope.last_activity = key.name.clone();
            envelope.organization_id = self.settings.organization_id.clone();

            self.tracker
                .track(&self.settings, &envelope, &key.name, TrackingState::Started)
                .await;

            let Some(running) = self.services.get_mut(&key.itinerary_id, &key.name) else {
                continue;
            };
            if let Err(e) = running
                .process(ProcessPayload::Json(document.clone()), &envelope)
                .await
            {
                self.tracker
                    .track_fault(&self.settings, &envelope, &key.name, FAULT_PROCESS_FAILED, &e.to_string())
                    .await;
            }
        }
    }

    pub(crate) async fn perform_action(&mut self, action: MsbAction) -> Option<RuntimeExit> {
        info!(action_id = %action.id, action = ?action.action, "performing maintenance action");
        match action.action {
            MaintenanceAction::Stop => {
                info!("State changed to InActive");
                self.settings.state = NodeState::InActive;
                self.services.stop_all().await;
            }
            MaintenanceAction::Start => {
                info!("State changed to Active");
                self.settings.state = NodeState::Active;
                self.reload_services().await;
            }
            MaintenanceAction::Restart => self.reload_services().await,
            MaintenanceAction::Reboot => {
                warn!("reboot requested");
                return Some(RuntimeExit::RebootRequested);
            }
            MaintenanceAction::Script => {
                warn!(action_id = %action.id, "script actions are not supported on this node");
                return None;
            }
            MaintenanceAction::Unknown => {
                warn!(action_id = %action.id, "unknown maintenance action");
                return None;
            }
        }

        if let Err(e) = self.backend.update(&self.settings).await {
            warn!(error = %e, "failed to update backend settings");
        }
        None
    }

    pub(crate) fn on_action(&self, action: HubAction) {
        if action.source.eq_ignore_ascii_case("core") {
            warn!(action = %action.action, "core actions are not supported on this node");
        } else {
            info!(source = %action.source, action = %action.action, "ignoring action");
        }
    }
}
