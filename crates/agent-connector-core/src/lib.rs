//! Core building blocks for the native agent connector.
//!
//! This crate provides:
//! - `MessageBridge` - Push-to-poll FIFO queue with a wake-up signal
//! - `Signal` - Manual-reset cross-thread signal
//! - `ConnectorConfig` - Library location and agent identity
//! - `MessageSink` and `AgentLibrary` traits

pub mod bridge;
pub mod config;
pub mod signal;
pub mod traits;

pub use bridge::MessageBridge;
pub use config::{AgentIdentity, ConfigError, ConnectorConfig, LibraryLocation};
pub use signal::{Signal, WaitError, WaitStatus};
pub use traits::{AgentError, AgentLibrary, MessageSink};
