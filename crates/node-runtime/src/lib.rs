//! Node Runtime for the edge node.
//!
//! [`NodeRuntime`] owns the itineraries, the running services and the
//! persistence store, and reacts to backend events, service events and its
//! own heartbeat on a single task. Delivery goes through the [`Dispatcher`],
//! lineage through the [`LineageTracker`].

mod dispatcher;
mod error;
mod heartbeat;
mod replay;
mod runtime;
mod tracker;

#[cfg(test)]
mod tests;

pub use dispatcher::{Dispatcher, LocalDelivery, SubmitOutcome};
pub use error::{
    RuntimeError, RuntimeResult, FAULT_DECRYPTION_FAILED, FAULT_PROCESS_FAILED,
    FAULT_ROUTING_FAILED, FAULT_SERVICE_NOT_CONFIGURED,
};
pub use heartbeat::{HeartbeatMonitor, Verdict};
pub use replay::{replay_all, ReplaySummary};
pub use runtime::{settings_from_config, NodeHandle, NodeRuntime, RuntimeExit, RuntimeOptions};
pub use tracker::LineageTracker;
