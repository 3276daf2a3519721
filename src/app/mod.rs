pub mod actions;
pub mod aggregate;
pub mod android;
pub mod cli;
pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod exec;
pub mod focus;
pub mod ios;
pub mod logging;
pub mod models;
pub mod parse;
pub mod scheduler;
pub mod toolchain;
