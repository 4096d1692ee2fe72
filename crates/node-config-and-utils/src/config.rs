//! Configuration management for the node.

use crate::{CoreError, CoreResult, Paths};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Node name used when the host name cannot be determined.
pub const DEFAULT_NODE_NAME: &str = "edge-node";

/// Default hub endpoint.
pub const DEFAULT_HUB_URI: &str = "wss://hub.edgebus.local";

const DEFAULT_HEARTBEAT_INTERVAL_SECS: u64 = 120;
const DEFAULT_ACCEPTED_MISSED_HEARTBEATS: u32 = 3;

/// Main node configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Name this node is addressed by in itinerary `host` fields.
    #[serde(default = "default_node_name")]
    pub node_name: String,
    /// Organization the node belongs to; stamped on every routed envelope.
    #[serde(default)]
    pub organization_id: String,
    /// Hub endpoint.
    #[serde(default = "default_hub_uri")]
    pub hub_uri: String,
    /// Tags this node answers to when an activity is hosted on a tag.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Encrypt payloads that leave this node.
    #[serde(default)]
    pub use_encryption: bool,
    /// Shared secret for payload encryption.
    #[serde(default, skip_serializing)]
    pub node_secret: Option<String>,
    /// Emit a tracking record for every hop.
    #[serde(default = "default_true")]
    pub enable_tracking: bool,
    /// Log debug events raised by services.
    #[serde(default)]
    pub debug: bool,
    /// Seconds between liveness pings.
    #[serde(default = "default_heartbeat_interval_secs")]
    pub heartbeat_interval_secs: u64,
    /// Consecutive unacknowledged pings tolerated before the process exits.
    #[serde(default = "default_accepted_missed_heartbeats")]
    pub accepted_missed_heartbeats: u32,
    /// Directory for undelivered records. Defaults to `<base_dir>/persist`.
    #[serde(default)]
    pub persist_dir: Option<PathBuf>,
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_node_name() -> String {
    hostname::get()
        .ok()
        .map(|name| name.to_string_lossy().to_lowercase())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| DEFAULT_NODE_NAME.to_string())
}

fn default_hub_uri() -> String {
    DEFAULT_HUB_URI.to_string()
}

fn default_true() -> bool {
    true
}

fn default_heartbeat_interval_secs() -> u64 {
    DEFAULT_HEARTBEAT_INTERVAL_SECS
}

fn default_accepted_missed_heartbeats() -> u32 {
    DEFAULT_ACCEPTED_MISSED_HEARTBEATS
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            node_name: default_node_name(),
            organization_id: String::new(),
            hub_uri: default_hub_uri(),
            tags: Vec::new(),
            use_encryption: false,
            node_secret: None,
            enable_tracking: true,
            debug: false,
            heartbeat_interval_secs: DEFAULT_HEARTBEAT_INTERVAL_SECS,
            accepted_missed_heartbeats: DEFAULT_ACCEPTED_MISSED_HEARTBEATS,
            persist_dir: None,
        }
    }
}

impl Config {
    /// Load configuration from `<base_dir>/config.json`, falling back to
    /// defaults, then apply environment overrides and validate.
    pub fn load(paths: &Paths) -> CoreResult<Self> {
        let config_path = paths.config_file();

        let mut config = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            Self::default()
        };

        config.load_from_env();
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a file. The node secret is never written.
    pub fn save(&self, paths: &Paths) -> CoreResult<()> {
        paths.ensure_dirs()?;
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(paths.config_file(), content)?;
        Ok(())
    }

    fn load_from_env(&mut self) {
        if let Ok(log_level) = std::env::var("EDGEBUS_LOG_LEVEL") {
            self.log_level = log_level;
        }
        if let Ok(node_name) = std::env::var("EDGEBUS_NODE_NAME") {
            if !node_name.trim().is_empty() {
                self.node_name = node_name.trim().to_string();
            }
        }
        if let Ok(secret) = std::env::var("EDGEBUS_NODE_SECRET") {
            if !secret.is_empty() {
                self.node_secret = Some(secret);
            }
        }
    }

    /// Reject combinations the node cannot run with.
    pub fn validate(&self) -> CoreResult<()> {
        if self.node_name.trim().is_empty() {
            return Err(CoreError::Config("node_name must not be empty".to_string()));
        }
        if self.use_encryption && self.node_secret.as_deref().map_or(true, str::is_empty) {
            return Err(CoreError::Config(
                "use_encryption is enabled but no node secret is configured".to_string(),
            ));
        }
        if self.heartbeat_interval_secs == 0 {
            return Err(CoreError::Config(
                "heartbeat_interval_secs must be greater than zero".to_string(),
            ));
        }
        self.hub_url()?;
        Ok(())
    }

    /// Directory for undelivered records.
    pub fn persist_dir(&self, paths: &Paths) -> PathBuf {
        self.persist_dir
            .clone()
            .unwrap_or_else(|| paths.persist_dir())
    }

    /// Get the hub URI as a parsed URL.
    pub fn hub_url(&self) -> CoreResult<Url> {
        Url::parse(&self.hub_uri).map_err(CoreError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.log_level, DEFAULT_LOG_LEVEL);
        assert_eq!(config.hub_uri, DEFAULT_HUB_URI);
        assert!(!config.node_name.is_empty());
        assert!(config.enable_tracking);
        assert!(!config.use_encryption);
        assert_eq!(config.heartbeat_interval_secs, 120);
        assert_eq!(config.accepted_missed_heartbeats, 3);
    }

    #[test]
    fn test_config_load_from_file_fills_defaults() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.json");

        let config_json = r#"{
            "log_level": "debug",
            "node_name": "node-1",
            "tags": ["plant-a"]
        }"#;
        std::fs::write(&config_path, config_json).unwrap();

        let config = Config::load_from_file(&config_path).unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.node_name, "node-1");
        assert_eq!(config.tags, vec!["plant-a".to_string()]);
        assert!(config.enable_tracking);
        assert_eq!(config.heartbeat_interval_secs, 120);
    }

    #[test]
    fn test_config_save_and_load_roundtrip() {
        let dir = tempdir().unwrap();
        let paths = Paths::with_base_dir(dir.path().to_path_buf());

        let config = Config {
            log_level: "trace".to_string(),
            node_name: "node-7".to_string(),
            ..Config::default()
        };
        config.save(&paths).unwrap();

        let loaded = Config::load_from_file(&paths.config_file()).unwrap();
        assert_eq!(loaded.log_level, "trace");
        assert_eq!(loaded.node_name, "node-7");
    }

    #[test]
    fn test_save_never_writes_secret() {
        let dir = tempdir().unwrap();
        let paths = Paths::with_base_dir(dir.path().to_path_buf());

        let config = Config {
            node_secret: Some("hunter2".to_string()),
            ..Config::default()
        };
        config.save(&paths).unwrap();

        let raw = std::fs::read_to_string(paths.config_file()).unwrap();
        assert!(!raw.contains("hunter2"));
    }

    #[test]
    fn test_encryption_without_secret_is_rejected() {
        let config = Config {
            use_encryption: true,
            node_secret: None,
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(CoreError::Config(_))));

        let config = Config {
            use_encryption: true,
            node_secret: Some("s3cret".to_string()),
            ..Config::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_persist_dir_override() {
        let paths = Paths::with_base_dir(PathBuf::from("/tmp/edgebus"));

        let config = Config::default();
        assert_eq!(config.persist_dir(&paths), PathBuf::from("/tmp/edgebus/persist"));

        let config = Config {
            persist_dir: Some(PathBuf::from("/var/lib/edgebus")),
            ..Config::default()
        };
        assert_eq!(config.persist_dir(&paths), PathBuf::from("/var/lib/edgebus"));
    }

    #[test]
    fn test_hub_url_parse() {
        let config = Config::default();
        let url = config.hub_url().unwrap();
        assert_eq!(url.scheme(), "wss");

        let config = Config {
            hub_uri: "not a url".to_string(),
            ..Config::default()
        };
        assert!(config.hub_url().is_err());
    }

    #[test]
    fn test_invalid_hub_uri_fails_validation() {
        let config = Config {
            hub_uri: "hub without scheme".to_string(),
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(CoreError::InvalidUrl(_))));
    }

    #[test]
    fn test_load_rejects_invalid_hub_uri() {
        let dir = tempdir().unwrap();
        let paths = Paths::with_base_dir(dir.path().to_path_buf());
        std::fs::write(paths.config_file(), r#"{"hub_uri": "::"}"#).unwrap();

        assert!(matches!(Config::load(&paths), Err(CoreError::InvalidUrl(_))));
    }
}
