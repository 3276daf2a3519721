pub mod discovery;
pub mod service;

pub use discovery::IosDiscovery;
pub use service::IosDeviceService;
