mod device;
mod device_store;
mod in_memory_device_store;
mod metadata;
mod request_context;
mod result;

pub use device::*;
pub use device_store::*;
pub use in_memory_device_store::*;
pub use metadata::*;
pub use request_context::*;
pub use result::*;
