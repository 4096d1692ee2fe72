//! Hosting of itinerary activities on this node.
//!
//! - [`MicroService`]: the contract every activity implementation fulfils
//! - [`ServiceContext`]: how a service raises events back to the node
//! - [`ServiceRegistry`]: factory selecting an implementation by type name
//! - [`ServiceLifecycle`]: the set of activities running here

mod builtin;
mod error;
mod lifecycle;
mod registry;
mod service;

pub use builtin::{LogService, PassthroughService, StateLoggerService};
pub use error::{ServiceError, ServiceResult};
pub use lifecycle::{Assignment, LoadReport, RunningService, ServiceLifecycle, ServiceState};
pub use registry::{ServiceConstructor, ServiceFactory, ServiceRegistry};
pub use service::{
    MicroService, ProcessPayload, ServiceContext, ServiceEvent, ServiceEventKind, ServiceKey,
};
