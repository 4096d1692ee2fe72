//! Routing engine.
//!
//! Given an envelope that just completed a hop, [`successors`] walks the
//! itinerary graph from the envelope's `LastActivity` and filters the
//! targets through their routing expressions. [`resolve_destinations`]
//! turns a successor's `host` template into concrete node names.

mod destination;
mod error;
mod successors;

pub use destination::{render_host, resolve_destinations, split_destinations};
pub use error::{RoutingError, RoutingResult};
pub use successors::successors;
