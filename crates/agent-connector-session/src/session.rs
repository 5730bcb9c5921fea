//! Agent session: handshake, outbound send and inbound polling.

use std::{
    fmt,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use agent_connector_core::{
    AgentError, AgentLibrary, ConnectorConfig, MessageBridge, MessageSink, WaitError, WaitStatus,
};
use agent_connector_native::{ConnectorError, NativeConnector};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Session identifier, used in diagnostics.
pub type SessionId = Uuid;

/// Session lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Library bound, handshake not yet performed.
    Uninitialized,
    /// Handshake done; messages flow both ways.
    Initialized,
    /// Torn down; only observers remain valid.
    Terminated,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Uninitialized => "uninitialized",
            Self::Initialized => "initialized",
            Self::Terminated => "terminated",
        })
    }
}

/// Session error.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Connector error: {0}")]
    Connector(#[from] ConnectorError),
    #[error("Agent error: {0}")]
    Agent(#[from] AgentError),
    #[error("Wait failed: {0}")]
    Wait(#[from] WaitError),
    #[error("Cannot {operation} while session is {state}")]
    InvalidState {
        operation: &'static str,
        state: SessionState,
    },
}

struct Inner<L> {
    state: SessionState,
    library: Option<L>,
}

/// One agent session over an [`AgentLibrary`].
///
/// Owned by the host. Inbound messages pushed by the library land in a
/// [`MessageBridge`] that the host drains with
/// [`AgentSession::try_next_message`] and parks on with
/// [`AgentSession::wait_for_next_message`]. Methods take `&self`, so the
/// session can be shared with a thread that tears it down while another is
/// blocked waiting.
pub struct AgentSession<L: AgentLibrary = NativeConnector> {
    id: SessionId,
    config: ConnectorConfig,
    bridge: Arc<MessageBridge>,
    inner: Mutex<Inner<L>>,
}

/// Session over the dynamically loaded connector.
pub type NativeSession = AgentSession<NativeConnector>;

impl AgentSession<NativeConnector> {
    /// Load the native connector named by `config` and bind its entry points.
    ///
    /// # Errors
    /// Returns [`SessionError::Connector`] if the library cannot be loaded or
    /// a required entry point is missing.
    pub fn connect(config: ConnectorConfig) -> Result<Self, SessionError> {
        let connector = NativeConnector::load(&config.library)?;
        Ok(Self::new(connector, config))
    }
}

impl<L: AgentLibrary> AgentSession<L> {
    /// Create a session over an already bound library.
    #[must_use]
    pub fn new(library: L, config: ConnectorConfig) -> Self {
        let id = Uuid::new_v4();
        tracing::debug!(session_id = %id, library = %config.library.display_name(), "Session created");
        Self {
            id,
            config,
            bridge: Arc::new(MessageBridge::new()),
            inner: Mutex::new(Inner {
                state: SessionState::Uninitialized,
                library: Some(library),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner<L>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Session identifier.
    #[must_use]
    pub const fn id(&self) -> SessionId {
        self.id
    }

    /// Configuration the session was created with.
    #[must_use]
    pub const fn config(&self) -> &ConnectorConfig {
        &self.config
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.lock().state
    }

    /// The inbound message bridge.
    #[must_use]
    pub const fn bridge(&self) -> &Arc<MessageBridge> {
        &self.bridge
    }

    /// Perform the handshake and register the bridge as the message sink.
    ///
    /// # Errors
    /// Returns [`SessionError::InvalidState`] unless the session is
    /// uninitialized, or the library's error if the handshake fails (the
    /// session then stays uninitialized).
    pub fn initialize_agent(&self) -> Result<(), SessionError> {
        let mut inner = self.lock();
        let library = match (inner.state, inner.library.as_ref()) {
            (SessionState::Uninitialized, Some(library)) => library,
            (state, _) => {
                return Err(SessionError::InvalidState {
                    operation: "initialize agent",
                    state,
                });
            }
        };

        tracing::info!(session_id = %self.id, agent_name = %self.config.identity.agent_name, "Initializing agent");
        let sink: Arc<dyn MessageSink> = self.bridge.clone();
        library.initialize(&self.config.identity, sink)?;
        inner.state = SessionState::Initialized;
        tracing::info!(session_id = %self.id, "Agent initialized");
        Ok(())
    }

    fn with_initialized<T>(
        &self,
        operation: &'static str,
        f: impl FnOnce(&L) -> Result<T, AgentError>,
    ) -> Result<T, SessionError> {
        let inner = self.lock();
        match (inner.state, inner.library.as_ref()) {
            (SessionState::Initialized, Some(library)) => Ok(f(library)?),
            (state, _) => Err(SessionError::InvalidState { operation, state }),
        }
    }

    /// Send `payload` under the configured route.
    ///
    /// # Errors
    /// Returns [`SessionError::InvalidState`] unless initialized, or the
    /// library's error.
    pub fn send(&self, payload: &str) -> Result<(), SessionError> {
        tracing::debug!(session_id = %self.id, payload, "Send");
        self.with_initialized("send", |library| {
            library.send(&self.config.route, payload)
        })
    }

    /// Send `payload` addressed to `plugin_id`.
    ///
    /// # Errors
    /// Returns [`SessionError::InvalidState`] unless initialized, or
    /// [`AgentError::Unsupported`] if the library lacks plugin messages.
    pub fn send_plugin_message(&self, plugin_id: &str, payload: &str) -> Result<(), SessionError> {
        tracing::debug!(session_id = %self.id, plugin_id, payload, "Send plugin message");
        self.with_initialized("send plugin message", |library| {
            library.send_plugin_message(plugin_id, payload)
        })
    }

    /// Pop the oldest inbound message, if any. Never blocks.
    #[must_use]
    pub fn try_next_message(&self) -> Option<String> {
        self.bridge.try_pop()
    }

    /// Pop every inbound message currently queued, oldest first.
    #[must_use]
    pub fn drain(&self) -> Vec<String> {
        std::iter::from_fn(|| self.bridge.try_pop()).collect()
    }

    /// Block until a message may be available or `timeout` elapses.
    ///
    /// `None` waits forever; `Some(Duration::ZERO)` polls. A signaled result
    /// does not guarantee [`AgentSession::try_next_message`] returns a value.
    /// A wait in progress when the session terminates returns promptly.
    ///
    /// # Errors
    /// Returns [`SessionError::InvalidState`] if the session is already
    /// terminated, or [`SessionError::Wait`] if the wait primitive fails.
    pub fn wait_for_next_message(
        &self,
        timeout: Option<Duration>,
    ) -> Result<WaitStatus, SessionError> {
        let state = self.state();
        if state == SessionState::Terminated {
            return Err(SessionError::InvalidState {
                operation: "wait for message",
                state,
            });
        }
        Ok(self.bridge.wait_for_message(timeout)?)
    }

    /// Release waiters and the library. Idempotent.
    pub fn terminate(&self) {
        let library = {
            let mut inner = self.lock();
            if inner.state == SessionState::Terminated {
                return;
            }
            inner.state = SessionState::Terminated;
            inner.library.take()
        };

        self.bridge.shutdown();
        drop(library);
        tracing::info!(
            session_id = %self.id,
            undelivered = self.bridge.len(),
            "Session terminated"
        );
    }
}

impl<L: AgentLibrary> Drop for AgentSession<L> {
    fn drop(&mut self) {
        self.terminate();
    }
}

impl<L: AgentLibrary> fmt::Debug for AgentSession<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentSession")
            .field("id", &self.id)
            .field("state", &self.state())
            .field("pending", &self.bridge.len())
            .finish_non_exhaustive()
    }
}
