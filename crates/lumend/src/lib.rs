//! Lumen daemon
//!
//! Wires the core's universe store to configuration, logging and a tokio
//! event loop.

pub mod daemon;
pub mod logging_setup;

pub use daemon::Daemon;
