pub mod runner;

#[cfg(test)]
pub mod fake;

pub use runner::{shell, CommandOutput, LaunchStatus, ProcessExecutor, SystemExecutor};
