//! Agent session orchestration over the native connector.
//!
//! Provides:
//! - `AgentSession` - Handshake, send, and poll/wait for inbound messages
//! - `SessionState` - `Uninitialized -> Initialized -> Terminated`

pub mod session;

pub use agent_connector_core::{ConnectorConfig, WaitStatus};
pub use session::{AgentSession, NativeSession, SessionError, SessionId, SessionState};
