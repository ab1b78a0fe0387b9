use opentelemetry_sdk::{logs::LoggerProvider, trace::TracerProvider as SdkTracerProvider};

/// Settings for [`init_telemetry`](super::init_telemetry)
#[derive(Clone, Debug)]
pub struct TelemetryConfig {
    pub service_name: String,
    /// Filter directive used when `RUST_LOG` is unset
    pub log_level: String,
    /// OTLP gRPC collector; `None` keeps output to JSON on stdout only
    pub otlp_endpoint: Option<String>,
}

impl TelemetryConfig {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            log_level: "info".to_string(),
            otlp_endpoint: None,
        }
    }

    pub fn with_log_level(mut self, log_level: impl Into<String>) -> Self {
        self.log_level = log_level.into();
        self
    }

    pub fn with_otlp_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.otlp_endpoint = Some(endpoint.into());
        self
    }

    pub fn exports_otlp(&self) -> bool {
        self.otlp_endpoint.is_some()
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self::new("device-registry")
    }
}

/// OTLP providers that must outlive the subscriber; hand them back to
/// [`shutdown_telemetry`](super::shutdown_telemetry) to flush on exit
pub struct TelemetryProviders {
    pub(crate) tracer_provider: SdkTracerProvider,
    pub(crate) logger_provider: LoggerProvider,
}
