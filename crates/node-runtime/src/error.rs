use itinerary_router::RoutingError;
use messaging_backend::BackendError;
use node_config_and_utils::PayloadCryptoError;
use persistence_store::StoreError;
use service_host::ServiceError;
use thiserror::Error;

/// Fault code tracked when a message targets a service this node does not run.
pub const FAULT_SERVICE_NOT_CONFIGURED: &str = "90001";
/// Fault code tracked when successor resolution fails.
pub const FAULT_ROUTING_FAILED: &str = "90002";
/// Fault code tracked when a service fails to process a message.
pub const FAULT_PROCESS_FAILED: &str = "90003";
/// Fault code tracked when an inbound payload cannot be decrypted.
pub const FAULT_DECRYPTION_FAILED: &str = "90004";

#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("service `{service}` of itinerary `{itinerary_id}` is not configured on this node")]
    ServiceNotConfigured { itinerary_id: String, service: String },

    #[error("itinerary `{0}` is not loaded")]
    UnknownItinerary(String),

    #[error("payload encryption is enabled but no node secret is configured")]
    MissingSecret,

    #[error("routing error: {0}")]
    Routing(#[from] RoutingError),

    #[error("service error: {0}")]
    Service(#[from] ServiceError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("payload error: {0}")]
    Crypto(#[from] PayloadCryptoError),
}

impl RuntimeError {
    /// Fault code recorded in the tracking record for this error.
    pub fn fault_code(&self) -> &'static str {
        match self {
            Self::ServiceNotConfigured { .. } | Self::UnknownItinerary(_) => {
                FAULT_SERVICE_NOT_CONFIGURED
            }
            Self::Routing(_) => FAULT_ROUTING_FAILED,
            Self::Crypto(_) | Self::MissingSecret => FAULT_DECRYPTION_FAILED,
            Self::Service(_) | Self::Store(_) | Self::Backend(_) => FAULT_PROCESS_FAILED,
        }
    }
}

pub type RuntimeResult<T> = Result<T, RuntimeError>;
