use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    /// Camera missing or access denied. Fatal to the session.
    #[error("camera unavailable: {0}")]
    DeviceUnavailable(String),
    /// One detector call failed. Recovered by the loop.
    #[error("inference failed: {0}")]
    Inference(String),
    /// The detection model could not be initialised. Fatal to the session.
    #[error("model load failed: {0}")]
    ModelLoad(String),
    #[error("failed to read {path}: {reason}")]
    Upload { path: String, reason: String },
    #[error("not found: {0}")]
    NotFound(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("operation failed: {0}")]
    OperationFailed(String),
}

pub type DomainResult<T> = Result<T, DomainError>;
