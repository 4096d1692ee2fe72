//! # Observability
//!
//! Logging setup shared by every edge node crate.
//!
//! Crates only emit through `tracing` macros. The binary calls
//! [`init_with_config`] once at startup and decides where lines go:
//!
//! - A JSONL file (`~/.edgebus/logs/node.jsonl` unless overridden), one
//!   object per event with timestamp, level, service, pid, target, message
//!   and structured fields.
//! - Optionally a compact human-readable stream on stderr.
//!
//! `RUST_LOG` always wins over the configured default level.
//!
//! ```rust,ignore
//! observability::init_with_config(observability::LogConfig {
//!     service_name: "edge-node".into(),
//!     default_level: "debug".into(),
//!     also_stderr: true,
//!     ..Default::default()
//! });
//! tracing::info!(node = "node-1", "signed in");
//! ```

#[cfg(feature = "dev")]
mod dev;

mod json_layer;

use std::path::PathBuf;

pub use json_layer::{JsonLayer, LogEntry};

/// Configuration for the logging system.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Name written into every log line (e.g. "edge-node").
    pub service_name: String,

    /// Default filter directive when `RUST_LOG` is unset.
    pub default_level: String,

    /// Custom JSONL file path. Defaults to `~/.edgebus/logs/node.jsonl`.
    pub log_path: Option<PathBuf>,

    /// Mirror events to stderr.
    pub also_stderr: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            service_name: "unknown".into(),
            default_level: "info".into(),
            log_path: None,
            also_stderr: false,
        }
    }
}

/// Initialize logging with defaults for the given service.
pub fn init(service_name: &str) {
    init_with_config(LogConfig {
        service_name: service_name.into(),
        ..Default::default()
    });
}

/// Initialize logging with a custom configuration.
///
/// Calling this more than once is harmless; later calls are ignored by the
/// global subscriber registry.
pub fn init_with_config(config: LogConfig) {
    #[cfg(feature = "dev")]
    {
        dev::init_file_subscriber(&config);
    }

    #[cfg(not(feature = "dev"))]
    {
        use tracing_subscriber::util::SubscriberInitExt;
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.default_level)),
            )
            .with_target(true)
            .compact()
            .finish()
            .try_init();
    }
}

pub use tracing::{debug, error, info, instrument, trace, warn};
pub use tracing::span;
pub use tracing::Level;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LogConfig::default();
        assert_eq!(config.service_name, "unknown");
        assert_eq!(config.default_level, "info");
        assert!(config.log_path.is_none());
        assert!(!config.also_stderr);
    }
}
