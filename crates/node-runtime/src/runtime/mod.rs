//! The task that owns all node state.

mod delivery;
mod maintenance;

use crate::{replay_all, Dispatcher, HeartbeatMonitor, LineageTracker, RuntimeError, RuntimeResult, Verdict};
use itinerary_types::{Itinerary, MsbAction, NodeSettings, NodeState};
use messaging_backend::{BackendEvent, MessagingBackend};
use node_config_and_utils::{Config, PayloadCipher};
use persistence_store::PersistenceStore;
use service_host::{ServiceEvent, ServiceFactory, ServiceLifecycle};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

const REPLAY_DELAY: Duration = Duration::from_secs(3);
const ACTION_DELAY: Duration = Duration::from_secs(5);
const MIN_HEARTBEAT_INTERVAL: Duration = Duration::from_millis(100);

/// Timing knobs for the runtime.
#[derive(Debug, Clone)]
pub struct RuntimeOptions {
    pub heartbeat_interval: Duration,
    /// Consecutive unacknowledged heartbeats tolerated before exiting.
    pub accepted_missed_heartbeats: u32,
    /// Delay between a sign-in or itinerary update and the replay it triggers.
    pub replay_delay: Duration,
    /// Settle delay before a maintenance action runs.
    pub action_delay: Duration,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(120),
            accepted_missed_heartbeats: 3,
            replay_delay: REPLAY_DELAY,
            action_delay: ACTION_DELAY,
        }
    }
}

impl RuntimeOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(config.heartbeat_interval_secs),
            accepted_missed_heartbeats: config.accepted_missed_heartbeats,
            ..Self::default()
        }
    }
}

/// Initial node settings. The node stays inactive until the hub says
/// otherwise.
pub fn settings_from_config(config: &Config) -> NodeSettings {
    NodeSettings {
        node_name: config.node_name.clone(),
        organization_id: config.organization_id.clone(),
        tags: config.tags.clone(),
        state: NodeState::InActive,
        enable_tracking: config.enable_tracking,
        use_encryption: config.use_encryption,
        debug: config.debug,
    }
}

/// Why [`NodeRuntime::run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeExit {
    Shutdown,
    /// Too many heartbeats went unacknowledged.
    HeartbeatLost,
    /// A `reboot` maintenance action asked for a restart.
    RebootRequested,
    /// The backend dropped its event channel.
    BackendClosed,
}

impl RuntimeExit {
    /// Whether a supervisor should treat the exit as a failure and restart.
    pub fn is_failure(self) -> bool {
        !matches!(self, Self::Shutdown)
    }
}

#[derive(Debug)]
pub(crate) enum Command {
    Replay,
    Maintenance(MsbAction),
    Shutdown,
}

/// Cloneable handle for talking to a running [`NodeRuntime`].
#[derive(Clone)]
pub struct NodeHandle {
    commands: mpsc::UnboundedSender<Command>,
}

impl NodeHandle {
    /// Ask the runtime to stop its services and return.
    pub fn shutdown(&self) {
        let _ = self.commands.send(Command::Shutdown);
    }

    /// Ask the runtime to replay persisted records now.
    pub fn replay(&self) {
        let _ = self.commands.send(Command::Replay);
    }
}

/// Owns the itineraries, the running services and the persistence store.
///
/// Every handler runs on the task that called [`run`](Self::run), so node
/// state is never mutated concurrently. Services report back through a
/// channel and are never called re-entrantly.
pub struct NodeRuntime {
    settings: NodeSettings,
    options: RuntimeOptions,
    itineraries: Vec<Itinerary>,
    services: ServiceLifecycle,
    dispatcher: Dispatcher,
    tracker: LineageTracker,
    store: Arc<PersistenceStore>,
    backend: Arc<dyn MessagingBackend>,
    cipher: Option<Arc<PayloadCipher>>,
    heartbeat: HeartbeatMonitor,
    signed_in: bool,
    backend_events: broadcast::Receiver<BackendEvent>,
    service_events: mpsc::UnboundedReceiver<ServiceEvent>,
    commands_tx: mpsc::UnboundedSender<Command>,
    commands_rx: mpsc::UnboundedReceiver<Command>,
}

impl NodeRuntime {
    pub fn new(
        settings: NodeSettings,
        options: RuntimeOptions,
        backend: Arc<dyn MessagingBackend>,
        store: Arc<PersistenceStore>,
        factory: Arc<dyn ServiceFactory>,
        cipher: Option<PayloadCipher>,
    ) -> RuntimeResult<Self> {
        if settings.use_encryption && cipher.is_none() {
            return Err(RuntimeError::MissingSecret);
        }
        let cipher = cipher.map(Arc::new);

        let (service_tx, service_events) = mpsc::unbounded_channel();
        let mut services = ServiceLifecycle::new(&settings.node_name, factory, service_tx);
        services.set_tags(settings.tags.clone());

        let (commands_tx, commands_rx) = mpsc::unbounded_channel();

        Ok(Self {
            dispatcher: Dispatcher::new(backend.clone(), store.clone(), cipher.clone()),
            tracker: LineageTracker::new(backend.clone(), store.clone()),
            heartbeat: HeartbeatMonitor::new(options.accepted_missed_heartbeats),
            backend_events: backend.subscribe(),
            settings,
            options,
            itineraries: Vec::new(),
            services,
            store,
            backend,
            cipher,
            signed_in: false,
            service_events,
            commands_tx,
            commands_rx,
        })
    }

    pub fn handle(&self) -> NodeHandle {
        NodeHandle {
            commands: self.commands_tx.clone(),
        }
    }

    pub fn settings(&self) -> &NodeSettings {
        &self.settings
    }

    pub fn itineraries(&self) -> &[Itinerary] {
        &self.itineraries
    }

    pub fn services(&self) -> &ServiceLifecycle {
        &self.services
    }

    /// Process events until shutdown, heartbeat exhaustion or a reboot
    /// request. Services are stopped and the backend is stopped on the way
    /// out.
    pub async fn run(mut self) -> RuntimeExit {
        let period = self.options.heartbeat_interval.max(MIN_HEARTBEAT_INTERVAL);
        let mut heartbeat = interval_at(Instant::now() + period, period);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(node = %self.settings.node_name, "node runtime started");

        let exit = loop {
            tokio::select! {
                event = self.backend_events.recv() => match event {
                    Ok(event) => {
                        if let Some(exit) = self.on_backend_event(event).await {
                            break exit;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "backend events dropped");
                    }
                    Err(broadcast::error::RecvError::Closed) => break RuntimeExit::BackendClosed,
                },
                Some(event) = self.service_events.recv() => self.on_service_event(event).await,
                Some(command) = self.commands_rx.recv() => {
                    if let Some(exit) = self.on_command(command).await {
                        break exit;
                    }
                }
                _ = heartbeat.tick() => {
                    if let Some(exit) = self.on_heartbeat().await {
                        break exit;
                    }
                }
            }
        };

        self.stop(exit).await;
        exit
    }

    async fn stop(&mut self, exit: RuntimeExit) {
        info!(?exit, "node runtime stopping");
        self.services.stop_all().await;
        if let Err(e) = self.backend.stop().await {
            warn!(error = %e, "failed to stop messaging backend");
        }
    }

    pub(crate) async fn on_backend_event(&mut self, event: BackendEvent) -> Option<RuntimeExit> {
        match event {
            BackendEvent::Connected => {
                info!("messaging backend connected");
                self.replay().await;
            }
            BackendEvent::Disconnected(reason) => {
                warn!(reason = reason.as_deref().unwrap_or("unknown"), "messaging backend disconnected");
            }
            BackendEvent::SignInComplete(response) => self.on_sign_in(response).await,
            BackendEvent::ItineraryUpdated(itinerary) => self.on_itinerary_updated(itinerary).await,
            BackendEvent::StateChanged(state) => self.on_state_changed(state).await,
            BackendEvent::TrackingChanged(enabled) => {
                info!(enabled, "tracking changed");
                self.settings.enable_tracking = enabled;
            }
            BackendEvent::DebugChanged(enabled) => {
                info!(enabled, "debug changed");
                self.settings.debug = enabled;
            }
            BackendEvent::StateReceived(document) => self.on_state_received(document).await,
            BackendEvent::QueueMessage { body, service } => self.on_queue_message(body, service).await,
            BackendEvent::ReceivedQueueError(message) => warn!(error = %message, "queue receive error"),
            BackendEvent::SubmitQueueError(message) => warn!(error = %message, "queue submit error"),
            BackendEvent::QueueDebug(message) => debug!(message = %message, "queue debug"),
            BackendEvent::Action(action) => self.on_action(action),
            BackendEvent::HeartbeatAck(id) => {
                debug!(id = %id, "heartbeat acknowledged");
                self.heartbeat.acknowledge();
            }
        }
        None
    }

    async fn on_command(&mut self, command: Command) -> Option<RuntimeExit> {
        match command {
            Command::Replay => {
                self.replay().await;
                None
            }
            Command::Maintenance(action) => self.perform_action(action).await,
            Command::Shutdown => Some(RuntimeExit::Shutdown),
        }
    }

    async fn on_heartbeat(&mut self) -> Option<RuntimeExit> {
        match self.heartbeat.tick() {
            Verdict::Exhausted => {
                error!(
                    missed = self.heartbeat.missed(),
                    accepted = self.options.accepted_missed_heartbeats,
                    "heartbeats unacknowledged, exiting"
                );
                Some(RuntimeExit::HeartbeatLost)
            }
            Verdict::Ping => {
                if self.heartbeat.missed() > 0 {
                    warn!(missed = self.heartbeat.missed(), "heartbeat acknowledgment missing");
                }
                let id = uuid::Uuid::new_v4().to_string();
                if let Err(e) = self.backend.heartbeat(&id).await {
                    debug!(error = %e, "heartbeat not sent");
                }
                self.replay().await;
                None
            }
        }
    }

    /// Replay persisted records. Skipped while offline so records are not
    /// dropped by attempts that cannot succeed.
    pub(crate) async fn replay(&mut self) {
        if !self.backend.is_connected() {
            debug!("backend offline, replay postponed");
            return;
        }
        if let Err(e) = replay_all(&self.store, self.backend.as_ref()).await {
            warn!(error = %e, "replay failed");
        }
    }

    fn schedule(&self, delay: Duration, command: Command) {
        let commands = self.commands_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = commands.send(command);
        });
    }

    /// Handle every queued service event, including the ones raised while
    /// handling earlier ones.
    #[cfg(test)]
    pub(crate) async fn pump(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(event) = self.service_events.try_recv() {
            self.on_service_event(event).await;
            handled += 1;
        }
        handled
    }

    /// Handle every queued internal command.
    #[cfg(test)]
    pub(crate) async fn pump_commands(&mut self) -> Option<RuntimeExit> {
        while let Ok(command) = self.commands_rx.try_recv() {
            if let Some(exit) = self.on_command(command).await {
                return Some(exit);
            }
        }
        None
    }
}
