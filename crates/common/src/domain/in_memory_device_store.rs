use crate::domain::{
    Device, DeviceId, DeviceStore, EncodedDocument, RequestContext, StoreError, StoreResult,
    decode, encode,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

/// Stored form of a device; metadata is kept encoded the same way a database
/// column would hold it.
#[derive(Debug, Clone)]
struct StoredDevice {
    hardware_id: String,
    name: String,
    metadata: EncodedDocument,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl StoredDevice {
    fn to_device(&self, id: DeviceId) -> StoreResult<Device> {
        Ok(Device {
            id,
            hardware_id: self.hardware_id.clone(),
            name: self.name.clone(),
            metadata: decode(self.metadata.as_raw()).map_err(|e| StoreError::codec(id, e))?,
            created_at: Some(self.created_at),
            updated_at: Some(self.updated_at),
        })
    }
}

/// In-memory implementation of DeviceStore using HashMap
#[derive(Clone, Default)]
pub struct InMemoryDeviceStore {
    devices: Arc<RwLock<HashMap<DeviceId, StoredDevice>>>,
}

impl InMemoryDeviceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DeviceStore for InMemoryDeviceStore {
    #[instrument(skip(self, ctx, device), fields(device_id = %device.id, hardware_id = %device.hardware_id))]
    async fn save(&self, ctx: &RequestContext, device: &mut Device) -> StoreResult<()> {
        let id = if device.id.is_nil() {
            DeviceId::generate()
        } else {
            device.id
        };
        let metadata = encode(Some(&device.metadata))
            .map_err(|e| StoreError::codec(&device.hardware_id, e))?;

        let (created_at, updated_at) = ctx
            .run(async {
                let mut devices = self.devices.write().await;

                let taken = devices
                    .iter()
                    .any(|(other, row)| *other != id && row.hardware_id == device.hardware_id);
                if taken {
                    return Err(StoreError::Conflict(device.hardware_id.clone()));
                }

                let now = Utc::now();
                let created_at = devices.get(&id).map_or(now, |row| row.created_at);
                devices.insert(
                    id,
                    StoredDevice {
                        hardware_id: device.hardware_id.clone(),
                        name: device.name.clone(),
                        metadata,
                        created_at,
                        updated_at: now,
                    },
                );
                Ok((created_at, now))
            })
            .await?;

        device.id = id;
        device.created_at = Some(created_at);
        device.updated_at = Some(updated_at);

        debug!(device_id = %id, "saved device in memory");
        Ok(())
    }

    #[instrument(skip(self, ctx), fields(device_id = %id))]
    async fn find_by_id(&self, ctx: &RequestContext, id: DeviceId) -> StoreResult<Device> {
        ctx.run(async {
            let devices = self.devices.read().await;
            devices
                .get(&id)
                .ok_or_else(|| StoreError::NotFound(id.to_string()))?
                .to_device(id)
        })
        .await
    }

    #[instrument(skip(self, ctx), fields(hardware_id = %hardware_id))]
    async fn find_by_hardware_id(
        &self,
        ctx: &RequestContext,
        hardware_id: &str,
    ) -> StoreResult<Device> {
        ctx.run(async {
            let devices = self.devices.read().await;
            let (id, row) = devices
                .iter()
                .find(|(_, row)| row.hardware_id == hardware_id)
                .ok_or_else(|| StoreError::NotFound(hardware_id.to_string()))?;
            row.to_device(*id)
        })
        .await
    }

    #[instrument(skip(self, ctx))]
    async fn find_all(&self, ctx: &RequestContext) -> StoreResult<Vec<Device>> {
        let devices = ctx
            .run(async {
                let devices = self.devices.read().await;
                let mut rows: Vec<_> = devices.iter().collect();
                rows.sort_by_key(|(id, row)| (row.created_at, **id));

                rows.into_iter()
                    .map(|(id, row)| row.to_device(*id))
                    .collect::<StoreResult<Vec<_>>>()
            })
            .await?;

        debug!("found {} devices in memory", devices.len());
        Ok(devices)
    }

    #[instrument(skip(self, ctx), fields(device_id = %id))]
    async fn delete(&self, ctx: &RequestContext, id: DeviceId) -> StoreResult<()> {
        ctx.run(async {
            let removed = self.devices.write().await.remove(&id);
            debug!(device_id = %id, removed = removed.is_some(), "deleted device from memory");
            Ok(())
        })
        .await
    }
}
