//! C callback trampoline.
//!
//! The connector's callback carries no user data, so the sink it should reach
//! lives in a process-wide slot. Only one sink can be registered at a time.

use std::{
    borrow::Cow,
    ffi::{CStr, c_char},
    panic::{self, AssertUnwindSafe},
    sync::{Arc, PoisonError, RwLock},
};

use agent_connector_core::{AgentError, MessageSink};

static ACTIVE_SINK: RwLock<Option<Arc<dyn MessageSink>>> = RwLock::new(None);

/// Keeps a sink registered until dropped.
#[derive(Debug)]
pub(crate) struct SinkRegistration {
    _private: (),
}

/// Register `sink` as the target of [`receive_message`].
///
/// # Errors
/// Returns [`AgentError::CallbackInUse`] if another sink is registered.
pub(crate) fn register(sink: Arc<dyn MessageSink>) -> Result<SinkRegistration, AgentError> {
    let mut slot = ACTIVE_SINK.write().unwrap_or_else(PoisonError::into_inner);
    if slot.is_some() {
        return Err(AgentError::CallbackInUse);
    }
    *slot = Some(sink);
    Ok(SinkRegistration { _private: () })
}

impl Drop for SinkRegistration {
    fn drop(&mut self) {
        ACTIVE_SINK
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        tracing::debug!("Message sink unregistered");
    }
}

/// Entry point handed to `initialize_agent`.
///
/// Runs on connector threads. Never unwinds into the caller.
pub(crate) extern "C" fn receive_message(destination: *const c_char, payload: *const c_char) {
    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        // SAFETY: the connector passes NUL-terminated strings valid for the call.
        let Some(payload) = (unsafe { lossy(payload) }) else {
            tracing::warn!("Dropped message with null payload");
            return;
        };
        // SAFETY: as above.
        let destination = unsafe { lossy(destination) }.unwrap_or_default();

        // Clone out so the sink runs without the slot lock held.
        let sink = ACTIVE_SINK
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        match sink {
            Some(sink) => sink.on_message(&destination, &payload),
            None => tracing::warn!(%destination, "No message sink registered, message dropped"),
        }
    }));

    if result.is_err() {
        tracing::error!("Message sink panicked");
    }
}

/// # Safety
/// `ptr` must be null or point to a NUL-terminated string.
unsafe fn lossy<'a>(ptr: *const c_char) -> Option<Cow<'a, str>> {
    if ptr.is_null() {
        None
    } else {
        // SAFETY: forwarded to the caller.
        Some(unsafe { CStr::from_ptr(ptr) }.to_string_lossy())
    }
}
