//! Shared data model for the edge node.
//!
//! - [`Itinerary`]: the activity graph received from the hub
//! - [`MessageEnvelope`]: the unit passed between activities
//! - [`TrackingRecord`]: per-hop lineage entry
//! - [`PersistedRecord`]: what the node buffers while offline
//! - Hub state documents: [`NodeState`], [`MsbAction`], [`SignInResponse`]

mod envelope;
mod itinerary;
mod persisted;
mod state;
mod tracking;

pub use envelope::{MessageEnvelope, Payload, Variable, VariableType, JSON_CONTENT_TYPE};
pub use itinerary::{
    Activity, ActivityConfig, ActivityData, ActivityKind, ConfigEntry, Connection, Endpoint,
    Itinerary, RECEIVE_ADAPTER_TYPES, STATE_RECEIVE_ADAPTER_TYPE,
};
pub use persisted::{PersistedMessage, PersistedRecord, RecordKind};
pub use state::{HubAction, MaintenanceAction, MsbAction, NodeSettings, NodeState, SignInResponse};
pub use tracking::{TrackingRecord, TrackingState, REDACTED_PAYLOAD};
