use chrono::{DateTime, Utc};
use common::domain::{
    Device, DeviceId, DeviceStore, DomainError, DomainResult, Metadata, RequestContext,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Service request for creating a device
#[derive(Debug, Clone)]
pub struct CreateDeviceRequest {
    pub hardware_id: String,
    pub name: Option<String>,
    pub metadata: Option<Metadata>,
}

/// Service request for getting a device
#[derive(Debug, Clone)]
pub struct GetDeviceRequest {
    pub device_id: DeviceId,
}

/// Service request for looking a device up by its hardware id
#[derive(Debug, Clone)]
pub struct GetDeviceByHardwareIdRequest {
    pub hardware_id: String,
}

/// Service request for updating a device.
///
/// `None` leaves the stored field untouched; `Some` replaces it. Metadata is
/// replaced wholesale, not merged key by key. The hardware id cannot change.
#[derive(Debug, Clone)]
pub struct UpdateDeviceRequest {
    pub device_id: DeviceId,
    pub name: Option<String>,
    pub metadata: Option<Metadata>,
}

/// Service request for deleting a device
#[derive(Debug, Clone)]
pub struct DeleteDeviceRequest {
    pub device_id: DeviceId,
}

/// Read-only projection of a device handed to callers
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceView {
    pub id: DeviceId,
    pub hardware_id: String,
    pub name: String,
    pub metadata: Metadata,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<Device> for DeviceView {
    fn from(device: Device) -> Self {
        DeviceView {
            id: device.id,
            hardware_id: device.hardware_id,
            name: device.name,
            metadata: device.metadata,
            created_at: device.created_at,
            updated_at: device.updated_at,
        }
    }
}

fn log_rejection(err: &DomainError) {
    match err {
        DomainError::DeviceNotFound(key) => warn!(key = %key, "device not found"),
        DomainError::DeviceAlreadyExists(hardware_id) => {
            warn!(hardware_id = %hardware_id, "device already exists")
        }
        _ => {}
    }
}

/// Domain service for device management business logic
/// This is the orchestration layer that transport handlers call
pub struct DeviceService {
    device_store: Arc<dyn DeviceStore>,
}

impl DeviceService {
    pub fn new(device_store: Arc<dyn DeviceStore>) -> Self {
        Self { device_store }
    }

    /// Construct and persist a new device
    #[instrument(skip(self, ctx, request), fields(hardware_id = %request.hardware_id))]
    pub async fn create_device(
        &self,
        ctx: &RequestContext,
        request: CreateDeviceRequest,
    ) -> DomainResult<DeviceView> {
        let mut device = Device::new(request.hardware_id, request.name, request.metadata)?;

        self.device_store
            .save(ctx, &mut device)
            .await
            .map_err(DomainError::from)
            .inspect_err(log_rejection)?;

        info!(device_id = %device.id, "device created");
        Ok(device.into())
    }

    /// Get a device by ID
    #[instrument(skip(self, ctx, request), fields(device_id = %request.device_id))]
    pub async fn get_device(
        &self,
        ctx: &RequestContext,
        request: GetDeviceRequest,
    ) -> DomainResult<DeviceView> {
        let device = self
            .device_store
            .find_by_id(ctx, request.device_id)
            .await
            .map_err(DomainError::from)
            .inspect_err(log_rejection)?;
        Ok(device.into())
    }

    /// Get a device by its hardware id
    #[instrument(skip(self, ctx, request), fields(hardware_id = %request.hardware_id))]
    pub async fn get_device_by_hardware_id(
        &self,
        ctx: &RequestContext,
        request: GetDeviceByHardwareIdRequest,
    ) -> DomainResult<DeviceView> {
        let device = self
            .device_store
            .find_by_hardware_id(ctx, &request.hardware_id)
            .await
            .map_err(DomainError::from)
            .inspect_err(log_rejection)?;
        Ok(device.into())
    }

    /// List every device
    #[instrument(skip(self, ctx))]
    pub async fn list_devices(&self, ctx: &RequestContext) -> DomainResult<Vec<DeviceView>> {
        let devices = self.device_store.find_all(ctx).await?;

        debug!(count = devices.len(), "listed devices");
        Ok(devices.into_iter().map(DeviceView::from).collect())
    }

    /// Apply a partial update to an existing device
    #[instrument(skip(self, ctx, request), fields(device_id = %request.device_id))]
    pub async fn update_device(
        &self,
        ctx: &RequestContext,
        request: UpdateDeviceRequest,
    ) -> DomainResult<DeviceView> {
        let mut device = self
            .device_store
            .find_by_id(ctx, request.device_id)
            .await
            .map_err(DomainError::from)
            .inspect_err(log_rejection)?;

        if let Some(name) = request.name {
            device.name = name;
        }
        if let Some(metadata) = request.metadata {
            device.metadata = metadata;
        }

        self.device_store
            .save(ctx, &mut device)
            .await
            .map_err(DomainError::from)
            .inspect_err(log_rejection)?;

        info!(device_id = %device.id, "device updated");
        Ok(device.into())
    }

    /// Delete a device. Fails with `DeviceNotFound` when no such device exists.
    #[instrument(skip(self, ctx, request), fields(device_id = %request.device_id))]
    pub async fn delete_device(
        &self,
        ctx: &RequestContext,
        request: DeleteDeviceRequest,
    ) -> DomainResult<()> {
        // The store treats deleting a missing row as a no-op, so check first
        let device = self
            .device_store
            .find_by_id(ctx, request.device_id)
            .await
            .map_err(DomainError::from)
            .inspect_err(log_rejection)?;

        self.device_store.delete(ctx, device.id).await?;

        info!(device_id = %device.id, "device deleted");
        Ok(())
    }
}
