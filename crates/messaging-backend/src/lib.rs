//! Contract between the node and its cloud messaging backend.
//!
//! - [`MessagingBackend`]: outbound operations (submit, track, state, heartbeat)
//! - [`BackendEvent`]: everything the backend pushes to the node, delivered
//!   over a broadcast channel
//! - [`LoopbackBackend`]: in-process backend for single-node runs

mod backend;
mod error;
mod loopback;

pub use backend::{BackendEvent, MessagingBackend};
pub use error::{BackendError, BackendResult};
pub use loopback::LoopbackBackend;
