//! Application wiring.

mod pending;
mod run;

pub use pending::list_pending;
pub use run::{run_node, RunRequest};
