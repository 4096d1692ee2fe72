//! Configuration, paths, logging and payload encryption for the edge node.

mod config;
mod error;
mod logging;
mod paths;
pub mod payload_crypto;

pub use config::{Config, DEFAULT_HUB_URI, DEFAULT_LOG_LEVEL, DEFAULT_NODE_NAME};
pub use error::{CoreError, CoreResult};
pub use logging::{init_logging, parse_level};
pub use paths::Paths;
pub use payload_crypto::{PayloadCipher, PayloadCryptoError};
