pub mod locator;
pub mod paths;

pub use locator::ToolchainLocator;
