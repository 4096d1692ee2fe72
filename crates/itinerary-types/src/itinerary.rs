use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Base types that receive messages from outside the itinerary.
pub const RECEIVE_ADAPTER_TYPES: [&str; 2] = ["onewayreceiveadapter", "twowayreceiveadapter"];

/// Base type of services that consume hub state documents.
pub const STATE_RECEIVE_ADAPTER_TYPE: &str = "statereceiveadapter";

/// A workflow graph pushed by the hub.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Itinerary {
    pub itinerary_id: String,
    #[serde(default)]
    pub integration_name: String,
    #[serde(default)]
    pub environment: String,
    #[serde(default)]
    pub tracking_level: String,
    #[serde(default)]
    pub activities: Vec<Activity>,
    #[serde(default)]
    pub connections: Vec<Connection>,
}

impl Itinerary {
    /// Find an activity by its service name (`userData.id`).
    pub fn activity_by_name(&self, name: &str) -> Option<&Activity> {
        self.activities.iter().find(|a| a.user_data.id == name)
    }

    /// Find an activity by its graph node id.
    pub fn activity_by_node(&self, node_id: &str) -> Option<&Activity> {
        self.activities.iter().find(|a| a.id == node_id)
    }

    /// Connections leaving `node_id`, in declaration order.
    pub fn outgoing<'a>(&'a self, node_id: &'a str) -> impl Iterator<Item = &'a Connection> + 'a {
        self.connections
            .iter()
            .filter(move |c| c.source.node == node_id)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActivityKind {
    #[default]
    #[serde(rename = "normal")]
    Normal,
    #[serde(rename = "connection-marker")]
    ConnectionMarker,
}

/// One node of the itinerary graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    /// Graph node id, referenced by connections.
    pub id: String,
    #[serde(rename = "type", default)]
    pub kind: ActivityKind,
    #[serde(rename = "userData")]
    pub user_data: ActivityData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityData {
    /// Service name. Envelopes refer to activities by this id.
    pub id: String,
    #[serde(default)]
    pub base_type: String,
    /// Implementation selector for the service factory. Falls back to `base_type`.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub service_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub integration_id: Option<String>,
    #[serde(default)]
    pub is_custom: bool,
    #[serde(default)]
    pub config: ActivityConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityConfig {
    #[serde(default)]
    pub general_config: Vec<ConfigEntry>,
    #[serde(default)]
    pub static_config: Vec<ConfigEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigEntry {
    pub id: String,
    #[serde(default)]
    pub value: Value,
}

impl ActivityConfig {
    pub fn general(&self, id: &str) -> Option<&Value> {
        self.general_config.iter().find(|e| e.id == id).map(|e| &e.value)
    }

    pub fn static_value(&self, id: &str) -> Option<&Value> {
        self.static_config.iter().find(|e| e.id == id).map(|e| &e.value)
    }

    fn set_general(&mut self, id: &str, value: Value) {
        match self.general_config.iter_mut().find(|e| e.id == id) {
            Some(entry) => entry.value = value,
            None => self.general_config.push(ConfigEntry {
                id: id.to_string(),
                value,
            }),
        }
    }
}

/// A directed edge between two activities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    pub source: Endpoint,
    pub target: Endpoint,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Endpoint {
    pub node: String,
}

impl Activity {
    /// Service name (`userData.id`).
    pub fn name(&self) -> &str {
        &self.user_data.id
    }

    pub fn base_type(&self) -> &str {
        &self.user_data.base_type
    }

    /// Key used to pick the implementation from the service registry.
    pub fn service_type(&self) -> &str {
        self.user_data
            .service_type
            .as_deref()
            .filter(|t| !t.is_empty())
            .unwrap_or(&self.user_data.base_type)
    }

    pub fn is_connection_marker(&self) -> bool {
        self.kind == ActivityKind::ConnectionMarker
    }

    pub fn is_receive_adapter(&self) -> bool {
        RECEIVE_ADAPTER_TYPES.contains(&self.user_data.base_type.as_str())
    }

    /// Configured host affinity: a node name, a comma-separated node list,
    /// a tag or a `{placeholder}` template.
    pub fn host(&self) -> Option<&str> {
        self.user_data
            .config
            .general("host")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|h| !h.is_empty())
    }

    pub fn set_host(&mut self, host: &str) {
        self.user_data
            .config
            .set_general("host", Value::String(host.to_string()));
    }

    /// Activities are enabled unless `enabled` is explicitly false.
    pub fn is_enabled(&self) -> bool {
        match self.user_data.config.general("enabled") {
            Some(Value::Bool(enabled)) => *enabled,
            Some(Value::String(s)) => !s.eq_ignore_ascii_case("false"),
            _ => true,
        }
    }

    pub fn routing_expression(&self) -> Option<&str> {
        self.user_data
            .config
            .static_value("routingExpression")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|e| !e.is_empty())
    }
}
