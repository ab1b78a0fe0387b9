use crate::domain::device::DeviceError;
use crate::domain::device_store::StoreError;
use thiserror::Error;

pub type DomainResult<T> = Result<T, DomainError>;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("Device already exists: {0}")]
    DeviceAlreadyExists(String),

    #[error("Request cancelled")]
    Cancelled,

    #[error("Request deadline exceeded")]
    DeadlineExceeded,

    #[error("Repository error: {0}")]
    RepositoryError(#[from] anyhow::Error),
}

impl From<DeviceError> for DomainError {
    fn from(err: DeviceError) -> Self {
        DomainError::ValidationError(err.to_string())
    }
}

impl From<StoreError> for DomainError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => DomainError::DeviceNotFound(id),
            StoreError::Conflict(hardware_id) => DomainError::DeviceAlreadyExists(hardware_id),
            StoreError::Cancelled => DomainError::Cancelled,
            StoreError::DeadlineExceeded => DomainError::DeadlineExceeded,
            StoreError::Codec { .. } => DomainError::RepositoryError(err.into()),
            StoreError::Repository(e) => DomainError::RepositoryError(e),
        }
    }
}
