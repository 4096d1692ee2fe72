//! Durable buffer for messages and tracking records the node could not
//! hand to the backend.
//!
//! One JSON file per record. File names carry the record kind as a prefix
//! (`_message_`, `_tracking_`) followed by a ULID, so enumeration in name
//! order within a kind, and ULID order across kinds, is creation order.

mod error;
mod store;

pub use error::{StoreError, StoreResult};
pub use store::{PersistenceStore, StoredKey, MESSAGE_PREFIX, TRACKING_PREFIX};
