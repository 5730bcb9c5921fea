//! Typed entry points resolved from the connector library.

use std::ffi::{c_char, c_void};

use crate::{error::SymbolNotFoundError, library::LoadedLibrary};

pub const SYMBOL_TABLE: &str = "agent_connector_symbols";
pub const INITIALIZE_AGENT: &str = "initialize_agent";
pub const SEND_MESSAGE: &str = "sendMessage";
pub const SEND_PLUGIN_MESSAGE: &str = "sendPluginMessage";

/// Inbound message callback: `(destination, payload)`.
pub type ReceiveCallback = extern "C" fn(*const c_char, *const c_char);

/// Returns the library's opaque table of further entry points.
pub type SymbolTableFn = unsafe extern "C" fn() -> *mut c_void;

/// `(agent_name, admin_address, build_version, group_id, instance_id_policy, on_message)`.
pub type InitializeAgentFn = unsafe extern "C" fn(
    *const c_char,
    *const c_char,
    *const c_char,
    *const c_char,
    *const c_char,
    ReceiveCallback,
);

/// `(route, payload)`.
pub type SendMessageFn = unsafe extern "C" fn(*const c_char, *const c_char);

/// `(plugin_id, payload)`.
pub type SendPluginMessageFn = unsafe extern "C" fn(*const c_char, *const c_char);

/// Resolve `symbol` from `library` as a value of type `T`.
///
/// # Safety
/// `T` must be the exact function-pointer type the library exports under
/// `symbol`, and the returned value must not be used after `library` is
/// dropped.
///
/// # Errors
/// Returns [`SymbolNotFoundError`] naming the symbol and the library.
pub unsafe fn resolve<T: Copy>(
    library: &LoadedLibrary,
    symbol: &str,
) -> Result<T, SymbolNotFoundError> {
    // SAFETY: forwarded to the caller.
    let found = unsafe { library.raw().get::<T>(symbol.as_bytes()) }.map_err(|source| {
        SymbolNotFoundError {
            symbol: symbol.to_string(),
            library: library.name().to_string(),
            source,
        }
    })?;
    tracing::trace!(library = library.name(), symbol, "Resolved symbol");
    Ok(*found)
}

/// Entry points of the agent connector.
///
/// Only valid while the [`LoadedLibrary`] they were bound from is alive;
/// [`crate::NativeConnector`] keeps both together.
#[derive(Clone, Copy)]
pub struct ConnectorSymbols {
    pub symbol_table: SymbolTableFn,
    pub initialize_agent: InitializeAgentFn,
    pub send_message: SendMessageFn,
    pub send_plugin_message: Option<SendPluginMessageFn>,
}

impl std::fmt::Debug for ConnectorSymbols {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectorSymbols")
            .field("send_plugin_message", &self.send_plugin_message.is_some())
            .finish_non_exhaustive()
    }
}

impl ConnectorSymbols {
    /// Resolve every required entry point, failing on the first missing one.
    ///
    /// `sendPluginMessage` is optional.
    ///
    /// # Errors
    /// Returns [`SymbolNotFoundError`] for the first required symbol missing.
    pub fn bind(library: &LoadedLibrary) -> Result<Self, SymbolNotFoundError> {
        // SAFETY: the types match the connector's C API, and the pointers are
        // stored next to the owning library by `NativeConnector`.
        unsafe {
            let symbols = Self {
                symbol_table: resolve(library, SYMBOL_TABLE)?,
                initialize_agent: resolve(library, INITIALIZE_AGENT)?,
                send_message: resolve(library, SEND_MESSAGE)?,
                send_plugin_message: resolve(library, SEND_PLUGIN_MESSAGE).ok(),
            };
            tracing::debug!(
                library = library.name(),
                plugin_messages = symbols.send_plugin_message.is_some(),
                "Bound connector entry points"
            );
            Ok(symbols)
        }
    }
}
