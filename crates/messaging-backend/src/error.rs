//! Backend error types.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Not connected to backend")]
    NotConnected,

    #[error("No route to node {0}")]
    Unreachable(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type BackendResult<T> = Result<T, BackendError>;
