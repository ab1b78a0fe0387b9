use crate::config::ServiceConfig;
use crate::domain::DeviceService;
use common::domain::{DeviceStore, RequestContext};
use common::postgres::{PostgresClient, PostgresDeviceStore};
use common::telemetry::TelemetryProviders;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Wires the device service to its backing store and hands out request contexts
pub struct DeviceApi {
    device_service: Arc<DeviceService>,
    request_timeout: Option<Duration>,
}

impl DeviceApi {
    pub fn new(device_store: Arc<dyn DeviceStore>, request_timeout: Option<Duration>) -> Self {
        Self {
            device_service: Arc::new(DeviceService::new(device_store)),
            request_timeout,
        }
    }

    /// Install logging (and OTLP export when enabled) for the process.
    /// Call once, before [`DeviceApi::connect`], and keep the providers until
    /// shutdown.
    pub fn init_telemetry(config: &ServiceConfig) -> anyhow::Result<Option<TelemetryProviders>> {
        let providers = common::telemetry::init_telemetry(&config.telemetry())?;
        info!(
            service_name = %config.service_name,
            otel_enabled = config.otel_enabled,
            "telemetry initialized"
        );
        Ok(providers)
    }

    /// Connect to PostgreSQL and build the service on top of it
    pub async fn connect(config: &ServiceConfig) -> anyhow::Result<Self> {
        let postgres = config.postgres();
        info!(
            host = %postgres.host,
            port = postgres.port,
            database = %postgres.database,
            "connecting to PostgreSQL"
        );

        let client = PostgresClient::from_config(&postgres)?;
        client.ping().await?;

        let device_store = Arc::new(PostgresDeviceStore::new(client));
        Ok(Self::new(device_store, config.request_timeout()))
    }

    pub fn device_service(&self) -> Arc<DeviceService> {
        self.device_service.clone()
    }

    /// Fresh context carrying the configured per-request deadline
    pub fn request_context(&self) -> RequestContext {
        match self.request_timeout {
            Some(timeout) => RequestContext::with_timeout(timeout),
            None => RequestContext::new(),
        }
    }
}
