pub mod discovery;
pub mod matcher;
pub mod service;

pub use discovery::AndroidDiscovery;
pub use matcher::IdentityMatcher;
pub use service::AndroidDeviceService;
