pub mod config;
pub mod device_api;
pub mod domain;

pub use config::ServiceConfig;
pub use device_api::DeviceApi;
pub use domain::*;
