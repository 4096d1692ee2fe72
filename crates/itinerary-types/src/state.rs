use crate::Itinerary;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Whether the node runs its services.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeState {
    Active,
    #[default]
    InActive,
}

impl NodeState {
    /// Anything other than "Active" (case-insensitive) is inactive.
    pub fn parse(state: &str) -> Self {
        if state.eq_ignore_ascii_case("active") {
            Self::Active
        } else {
            Self::InActive
        }
    }

    pub fn is_active(self) -> bool {
        self == Self::Active
    }
}

/// Node-wide settings shared with the backend on `Update`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeSettings {
    pub node_name: String,
    pub organization_id: String,
    pub tags: Vec<String>,
    pub state: NodeState,
    pub enable_tracking: bool,
    pub use_encryption: bool,
    pub debug: bool,
}

/// Payload of a successful hub sign-in.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignInResponse {
    #[serde(default)]
    pub itineraries: Vec<Itinerary>,
    #[serde(default)]
    pub state: NodeState,
    #[serde(default)]
    pub debug: bool,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default = "default_true")]
    pub enable_tracking: bool,
    #[serde(default)]
    pub organization_id: Option<String>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MaintenanceAction {
    Stop,
    Start,
    Restart,
    Reboot,
    Script,
    #[serde(other)]
    Unknown,
}

/// Maintenance request carried in a hub state document under `msbaction`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MsbAction {
    pub id: String,
    pub action: MaintenanceAction,
}

impl MsbAction {
    /// The request in `desired.msbaction` that `reported.msbaction` has not
    /// acknowledged yet.
    pub fn pending(state: &Value) -> Option<Self> {
        let desired = state.pointer("/desired/msbaction")?;
        desired.get("action")?;
        let action: MsbAction = serde_json::from_value(desired.clone()).ok()?;

        let reported_id = state
            .pointer("/reported/msbaction/id")
            .and_then(Value::as_str);
        match reported_id {
            Some(id) if id == action.id => None,
            _ => Some(action),
        }
    }

    /// Reported-side document acknowledging this request.
    pub fn acknowledgement(&self) -> Value {
        serde_json::json!({ "msbaction": self })
    }
}

/// Action pushed by the backend outside the itinerary flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HubAction {
    pub source: String,
    pub action: String,
    #[serde(default)]
    pub payload: Value,
}
