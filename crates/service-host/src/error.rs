use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("no implementation registered for service type `{0}`")]
    UnknownType(String),

    #[error("failed to instantiate `{name}`: {reason}")]
    Instantiation { name: String, reason: String },

    #[error("activity `{0}` is not part of the itinerary")]
    UnknownActivity(String),

    #[error("activity `{0}` is disabled")]
    Disabled(String),

    #[error("service `{0}` is not started")]
    NotStarted(String),

    #[error("{0}")]
    Failed(String),

    #[error("payload is not valid JSON: {0}")]
    InvalidPayload(String),

    #[error("node event channel is closed")]
    EventChannelClosed,
}

pub type ServiceResult<T> = Result<T, ServiceError>;
