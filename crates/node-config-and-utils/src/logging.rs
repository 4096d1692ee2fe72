//! Logging initialization for the node.
//!
//! Structured JSONL goes to `~/.edgebus/logs/node.jsonl` and a compact copy
//! to stderr.

use std::path::PathBuf;

/// Initialize logging for the node binary.
///
/// `level` is the default filter; `RUST_LOG` overrides it. `log_path`
/// defaults to `~/.edgebus/logs/node.jsonl`.
pub fn init_logging(level: &str, log_path: Option<PathBuf>) {
    observability::init_with_config(observability::LogConfig {
        service_name: "edge-node".into(),
        default_level: level.into(),
        log_path,
        also_stderr: true,
    });
}

/// Parse a log level string into a tracing Level.
pub fn parse_level(level: &str) -> tracing::Level {
    match level.to_lowercase().as_str() {
        "trace" => tracing::Level::TRACE,
        "debug" => tracing::Level::DEBUG,
        "warn" | "warning" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        _ => tracing::Level::INFO,
    }
}
