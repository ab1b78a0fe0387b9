use crate::domain::device::{Device, DeviceId};
use crate::domain::metadata::CodecError;
use crate::domain::request_context::RequestContext;
use async_trait::async_trait;
use std::fmt;
use thiserror::Error;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("device not found: {0}")]
    NotFound(String),

    #[error("device with hardware id already exists: {0}")]
    Conflict(String),

    #[error("metadata codec error for device {device}: {source}")]
    Codec {
        device: String,
        #[source]
        source: CodecError,
    },

    #[error("request cancelled")]
    Cancelled,

    #[error("request deadline exceeded")]
    DeadlineExceeded,

    #[error("repository error: {0}")]
    Repository(#[from] anyhow::Error),
}

impl StoreError {
    /// Codec failure tagged with the device it happened on (id, or hardware id
    /// before one is assigned)
    pub fn codec(device: impl fmt::Display, source: CodecError) -> Self {
        StoreError::Codec {
            device: device.to_string(),
            source,
        }
    }
}

/// Persistence contract for devices.
/// Infrastructure adapters (PostgreSQL, in-memory) implement this trait.
///
/// Mutations never report a missing row: `save` on an identifier with no row
/// inserts it, and `delete` of an unknown identifier is a no-op.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait DeviceStore: Send + Sync {
    /// Insert or replace the device. Assigns `id` when unset and refreshes
    /// `created_at` / `updated_at` on the passed entity.
    async fn save(&self, ctx: &RequestContext, device: &mut Device) -> StoreResult<()>;

    /// Point lookup by identifier
    async fn find_by_id(&self, ctx: &RequestContext, id: DeviceId) -> StoreResult<Device>;

    /// Point lookup by hardware id
    async fn find_by_hardware_id(
        &self,
        ctx: &RequestContext,
        hardware_id: &str,
    ) -> StoreResult<Device>;

    /// All devices, oldest first. Empty when no rows exist.
    async fn find_all(&self, ctx: &RequestContext) -> StoreResult<Vec<Device>>;

    /// Remove the device with the given identifier
    async fn delete(&self, ctx: &RequestContext, id: DeviceId) -> StoreResult<()>;
}
