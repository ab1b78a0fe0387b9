use crate::domain::metadata::Metadata;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    #[error("hardware id cannot be empty")]
    HardwareIdEmpty,

    #[error("invalid device id: {0}")]
    InvalidDeviceId(String),
}

/// Opaque device identifier. The nil value means "not yet persisted".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(Uuid);

impl DeviceId {
    pub const fn nil() -> Self {
        Self(Uuid::nil())
    }

    /// Fresh random identifier; only stores call this
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub const fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    pub fn is_nil(&self) -> bool {
        self.0.is_nil()
    }

    pub fn parse(value: &str) -> Result<Self, DeviceError> {
        value.parse()
    }
}

impl FromStr for DeviceId {
    type Err = DeviceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|_| DeviceError::InvalidDeviceId(s.to_string()))
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Device aggregate root
///
/// `id`, `created_at` and `updated_at` are owned by the store: they stay unset
/// until the device is saved and are refreshed on every save.
#[derive(Debug, Clone, PartialEq)]
pub struct Device {
    pub id: DeviceId,
    pub hardware_id: String,
    pub name: String,
    pub metadata: Metadata,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Device {
    /// Builds an unsaved device.
    ///
    /// A missing name becomes the empty string and missing metadata becomes an
    /// empty map, so neither is ever absent on a constructed entity.
    pub fn new(
        hardware_id: impl Into<String>,
        name: Option<String>,
        metadata: Option<Metadata>,
    ) -> Result<Self, DeviceError> {
        let hardware_id = hardware_id.into();
        if hardware_id.is_empty() {
            return Err(DeviceError::HardwareIdEmpty);
        }

        Ok(Self {
            id: DeviceId::nil(),
            hardware_id,
            name: name.unwrap_or_default(),
            metadata: metadata.unwrap_or_default(),
            created_at: None,
            updated_at: None,
        })
    }

    pub fn is_persisted(&self) -> bool {
        !self.id.is_nil()
    }
}
