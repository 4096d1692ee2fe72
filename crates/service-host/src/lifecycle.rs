//! The set of activities running on this node.

use crate::{
    MicroService, ProcessPayload, ServiceContext, ServiceError, ServiceEvent, ServiceFactory,
    ServiceKey, ServiceResult,
};
use itinerary_types::{Activity, ActivityConfig, Itinerary, MessageEnvelope};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    Created,
    Started,
    Stopped,
}

/// Where an activity runs, as seen from this node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assignment {
    /// Hosted here by name or by membership in a host list.
    Local,
    /// A receive adapter hosted on a tag this node carries.
    ClaimedTag,
    NotHere,
}

impl Assignment {
    pub fn of(activity: &Activity, node_name: &str, tags: &[String]) -> Self {
        if activity.is_connection_marker() {
            return Self::NotHere;
        }
        let Some(host) = activity.host() else {
            return Self::NotHere;
        };

        if host
            .split(',')
            .map(str::trim)
            .any(|h| h.eq_ignore_ascii_case(node_name))
        {
            return Self::Local;
        }
        if activity.is_receive_adapter() && tags.iter().any(|t| t == host) {
            return Self::ClaimedTag;
        }
        Self::NotHere
    }
}

/// Outcome of loading an itinerary.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LoadReport {
    pub loaded: Vec<String>,
    pub disabled: Vec<String>,
    /// `(activity, reason)` for every activity that failed to construct.
    pub failed: Vec<(String, String)>,
}

/// One activity instance hosted on this node.
pub struct RunningService {
    key: ServiceKey,
    integration_name: String,
    base_type: String,
    config: ActivityConfig,
    state: ServiceState,
    generation: u64,
    instance: Box<dyn MicroService>,
}

impl std::fmt::Debug for RunningService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunningService")
            .field("key", &self.key)
            .field("base_type", &self.base_type)
            .field("state", &self.state)
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}

impl RunningService {
    pub fn key(&self) -> &ServiceKey {
        &self.key
    }

    pub fn name(&self) -> &str {
        &self.key.name
    }

    pub fn itinerary_id(&self) -> &str {
        &self.key.itinerary_id
    }

    pub fn integration_name(&self) -> &str {
        &self.integration_name
    }

    pub fn base_type(&self) -> &str {
        &self.base_type
    }

    pub fn config(&self) -> &ActivityConfig {
        &self.config
    }

    pub fn state(&self) -> ServiceState {
        self.state
    }

    /// Bumped every time the instance is started.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_started(&self) -> bool {
        self.state == ServiceState::Started
    }

    pub async fn start(&mut self) -> ServiceResult<()> {
        if self.is_started() {
            return Ok(());
        }
        self.instance.start().await?;
        self.state = ServiceState::Started;
        self.generation += 1;
        Ok(())
    }

    pub async fn stop(&mut self) -> ServiceResult<()> {
        if self.state != ServiceState::Started {
            self.state = ServiceState::Stopped;
            return Ok(());
        }
        self.state = ServiceState::Stopped;
        self.instance.stop().await
    }

    pub async fn process(&mut self, payload: ProcessPayload, envelope: &MessageEnvelope) -> ServiceResult<()> {
        if !self.is_started() {
            return Err(ServiceError::NotStarted(self.key.name.clone()));
        }
        self.instance.process(payload, envelope).await
    }
}

/// Owns every [`RunningService`] on the node.
pub struct ServiceLifecycle {
    node_name: String,
    tags: Vec<String>,
    factory: Arc<dyn ServiceFactory>,
    events: mpsc::UnboundedSender<ServiceEvent>,
    services: Vec<RunningService>,
}

impl ServiceLifecycle {
    pub fn new(
        node_name: &str,
        factory: Arc<dyn ServiceFactory>,
        events: mpsc::UnboundedSender<ServiceEvent>,
    ) -> Self {
        Self {
            node_name: node_name.to_string(),
            tags: Vec::new(),
            factory,
            events,
            services: Vec::new(),
        }
    }

    pub fn node_name(&self) -> &str {
        &self.node_name
    }

    pub fn set_tags(&mut self, tags: Vec<String>) {
        self.tags = tags;
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    /// Construct every activity of `itinerary` assigned to this node.
    ///
    /// Receive adapters claimed through a tag get their `host` rewritten to
    /// this node's name. Disabled activities and construction failures are
    /// reported and skipped; loading continues with the next activity.
    pub fn load_assigned(&mut self, itinerary: &mut Itinerary) -> LoadReport {
        let mut report = LoadReport::default();

        for idx in 0..itinerary.activities.len() {
            let assignment = Assignment::of(&itinerary.activities[idx], &self.node_name, &self.tags);
            match assignment {
                Assignment::NotHere => continue,
                Assignment::ClaimedTag => {
                    let activity = &mut itinerary.activities[idx];
                    info!(
                        activity = %activity.name(),
                        tag = activity.host().unwrap_or_default(),
                        node = %self.node_name,
                        "claiming tag-hosted receive adapter"
                    );
                    activity.set_host(&self.node_name);
                }
                Assignment::Local => {}
            }

            let activity = &itinerary.activities[idx];
            let name = activity.name().to_string();
            if !activity.is_enabled() {
                info!(itinerary_id = %itinerary.itinerary_id, activity = %name, "Disabled");
                report.disabled.push(name);
                continue;
            }
            if self.get(&itinerary.itinerary_id, &name).is_some() {
                debug!(activity = %name, "already loaded");
                continue;
            }

            match self.construct(itinerary, activity) {
                Ok(service) => {
                    self.services.push(service);
                    report.loaded.push(name);
                }
                Err(e) => {
                    warn!(
                        itinerary_id = %itinerary.itinerary_id,
                        activity = %name,
                        error = %e,
                        "failed to instantiate service"
                    );
                    report.failed.push((name, e.to_string()));
                }
            }
        }

        report
    }

    /// Construct one activity on demand, regardless of its configured host.
    pub fn instantiate(&mut self, itinerary: &Itinerary, name: &str) -> ServiceResult<&mut RunningService> {
        if let Some(idx) = self.position(&itinerary.itinerary_id, name) {
            return Ok(&mut self.services[idx]);
        }

        let activity = itinerary
            .activity_by_name(name)
            .filter(|a| !a.is_connection_marker())
            .ok_or_else(|| ServiceError::UnknownActivity(name.to_string()))?;
        if !activity.is_enabled() {
            return Err(ServiceError::Disabled(name.to_string()));
        }

        let service = self.construct(itinerary, activity)?;
        info!(
            itinerary_id = %itinerary.itinerary_id,
            activity = %name,
            "instantiated service for dynamic route"
        );
        let idx = self.services.len();
        self.services.push(service);
        Ok(&mut self.services[idx])
    }

    fn construct(&self, itinerary: &Itinerary, activity: &Activity) -> ServiceResult<RunningService> {
        let key = ServiceKey {
            itinerary_id: itinerary.itinerary_id.clone(),
            name: activity.name().to_string(),
        };
        let ctx = ServiceContext::new(
            key.clone(),
            &self.node_name,
            &itinerary.integration_name,
            self.events.clone(),
        );

        let instantiation = |e: ServiceError| match e {
            ServiceError::Instantiation { .. } => e,
            other => ServiceError::Instantiation {
                name: activity.name().to_string(),
                reason: other.to_string(),
            },
        };

        let mut instance = self
            .factory
            .create(activity.service_type(), ctx)
            .map_err(instantiation)?;
        instance.init(&activity.user_data.config).map_err(instantiation)?;

        Ok(RunningService {
            key,
            integration_name: itinerary.integration_name.clone(),
            base_type: activity.base_type().to_string(),
            config: activity.user_data.config.clone(),
            state: ServiceState::Created,
            generation: 0,
            instance,
        })
    }

    /// Start every service that is not running. Returns how many started.
    pub async fn start_all(&mut self) -> usize {
        let mut started = 0;
        for service in &mut self.services {
            if service.is_started() {
                continue;
            }
            match service.start().await {
                Ok(()) => started += 1,
                Err(e) => warn!(service = %service.name(), error = %e, "failed to start service"),
            }
        }
        started
    }

    /// Stop every service. Best-effort: failures are logged.
    pub async fn stop_all(&mut self) {
        for service in &mut self.services {
            if let Err(e) = service.stop().await {
                warn!(service = %service.name(), error = %e, "failed to stop service");
            }
        }
    }

    /// Stop and drop every service.
    pub async fn clear(&mut self) {
        self.stop_all().await;
        self.services.clear();
    }

    fn position(&self, itinerary_id: &str, name: &str) -> Option<usize> {
        self.services
            .iter()
            .position(|s| s.itinerary_id() == itinerary_id && s.name() == name)
    }

    pub fn get(&self, itinerary_id: &str, name: &str) -> Option<&RunningService> {
        self.position(itinerary_id, name).map(|idx| &self.services[idx])
    }

    pub fn get_mut(&mut self, itinerary_id: &str, name: &str) -> Option<&mut RunningService> {
        self.position(itinerary_id, name)
            .map(move |idx| &mut self.services[idx])
    }

    pub fn by_base_type_mut<'a>(
        &'a mut self,
        base_type: &'a str,
    ) -> impl Iterator<Item = &'a mut RunningService> + 'a {
        self.services
            .iter_mut()
            .filter(move |s| s.base_type.eq_ignore_ascii_case(base_type))
    }

    pub fn iter(&self) -> impl Iterator<Item = &RunningService> {
        self.services.iter()
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}
