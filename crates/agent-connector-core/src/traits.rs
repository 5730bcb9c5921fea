//! Core traits for message delivery and the agent library seam.

use std::sync::Arc;

use thiserror::Error;

use crate::config::AgentIdentity;

/// Receiver of inbound messages pushed by an agent library.
///
/// Implementations are invoked from threads the host does not control and
/// must return promptly without panicking.
pub trait MessageSink: Send + Sync {
    /// Deliver one message.
    fn on_message(&self, destination: &str, payload: &str);
}

/// Agent library error.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("String argument `{field}` contains an interior NUL byte")]
    InvalidString { field: &'static str },
    #[error("Another message sink is already registered with the agent library")]
    CallbackInUse,
    #[error("Entry point not available: {0}")]
    Unsupported(&'static str),
    #[error("Agent library error: {0}")]
    Library(String),
}

/// Trait for agent libraries the session talks to.
///
/// The native connector implements this over dynamically loaded entry points;
/// tests substitute an in-process double.
pub trait AgentLibrary: Send + Sync {
    /// Perform the one-time handshake and register `sink` for inbound messages.
    ///
    /// # Errors
    /// Returns error if the identity cannot be passed to the library or the
    /// library rejects the registration.
    fn initialize(
        &self,
        identity: &AgentIdentity,
        sink: Arc<dyn MessageSink>,
    ) -> Result<(), AgentError>;

    /// Send a payload under `route`.
    ///
    /// # Errors
    /// Returns error if the library signals a failure.
    fn send(&self, route: &str, payload: &str) -> Result<(), AgentError>;

    /// Send a payload addressed to a plugin.
    ///
    /// # Errors
    /// Returns [`AgentError::Unsupported`] unless the library provides it.
    fn send_plugin_message(&self, plugin_id: &str, payload: &str) -> Result<(), AgentError> {
        let _ = (plugin_id, payload);
        Err(AgentError::Unsupported("sendPluginMessage"))
    }
}
