//! Integration tests for the Node Runtime.
//!
//! Test organization:
//!
//! - `harness.rs`         - Recording backend, recording services and `TestNode`
//! - `routing.rs`         - Completion tracking and successor routing
//! - `dispatch.rs`        - Local and remote delivery, encryption, faults
//! - `dynamic_routing.rs` - On-demand instantiation of dynamically routed services
//! - `replay.rs`          - Persistence while offline and replay on reconnect
//! - `heartbeat.rs`       - Liveness pings and exit on missed acknowledgments
//! - `maintenance.rs`     - Sign-in, state changes and maintenance actions

mod heartbeat;
