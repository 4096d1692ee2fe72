use crate::builtin::{LogService, PassthroughService, StateLoggerService};
use crate::{MicroService, ServiceContext, ServiceError, ServiceResult};
use std::collections::HashMap;
use std::sync::Arc;

pub type ServiceConstructor =
    Arc<dyn Fn(ServiceContext) -> ServiceResult<Box<dyn MicroService>> + Send + Sync>;

/// Builds service instances for activities.
pub trait ServiceFactory: Send + Sync {
    fn create(&self, service_type: &str, ctx: ServiceContext) -> ServiceResult<Box<dyn MicroService>>;
}

/// Factory keyed by service type name.
///
/// Registering a type again replaces its constructor. Instances created
/// before the replacement keep running until the next reload.
#[derive(Clone, Default)]
pub struct ServiceRegistry {
    constructors: HashMap<String, ServiceConstructor>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with `passthrough`, `log` and `statelogger`.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("passthrough", |ctx| {
            Ok(Box::new(PassthroughService::new(ctx)) as Box<dyn MicroService>)
        });
        registry.register("log", |ctx| Ok(Box::new(LogService::new(ctx)) as Box<dyn MicroService>));
        registry.register("statelogger", |ctx| {
            Ok(Box::new(StateLoggerService::new(ctx)) as Box<dyn MicroService>)
        });
        registry
    }

    pub fn register<F>(&mut self, service_type: &str, constructor: F)
    where
        F: Fn(ServiceContext) -> ServiceResult<Box<dyn MicroService>> + Send + Sync + 'static,
    {
        self.constructors
            .insert(service_type.to_lowercase(), Arc::new(constructor));
    }

    pub fn contains(&self, service_type: &str) -> bool {
        self.constructors.contains_key(&service_type.to_lowercase())
    }

    pub fn types(&self) -> Vec<&str> {
        let mut types: Vec<_> = self.constructors.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }
}

impl ServiceFactory for ServiceRegistry {
    fn create(&self, service_type: &str, ctx: ServiceContext) -> ServiceResult<Box<dyn MicroService>> {
        let constructor = self
            .constructors
            .get(&service_type.to_lowercase())
            .ok_or_else(|| ServiceError::UnknownType(service_type.to_string()))?;
        constructor(ctx)
    }
}
