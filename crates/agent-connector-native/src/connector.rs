//! Agent library backed by the dynamically loaded connector.

use std::{
    ffi::CString,
    sync::{Arc, Mutex, PoisonError},
};

use agent_connector_core::{AgentError, AgentIdentity, AgentLibrary, LibraryLocation, MessageSink};

use crate::{
    callback::{self, SinkRegistration},
    error::ConnectorError,
    library::LoadedLibrary,
    symbols::ConnectorSymbols,
};

/// The native agent connector: a loaded library plus its bound entry points.
///
/// Field order matters: the sink registration is dropped before the library
/// is unmapped.
#[derive(Debug)]
pub struct NativeConnector {
    registration: Mutex<Option<SinkRegistration>>,
    symbols: ConnectorSymbols,
    library: LoadedLibrary,
}

impl NativeConnector {
    /// Load the connector at `location` and bind its entry points.
    ///
    /// # Errors
    /// Returns error if the library cannot be loaded or a required entry
    /// point is missing. No entry points are bound on failure.
    pub fn load(location: &LibraryLocation) -> Result<Self, ConnectorError> {
        let library = LoadedLibrary::load(location)?;
        Self::from_library(library)
    }

    /// Bind entry points from an already loaded library.
    ///
    /// # Errors
    /// Returns error if a required entry point is missing; the library is
    /// released in that case.
    pub fn from_library(library: LoadedLibrary) -> Result<Self, ConnectorError> {
        let symbols = ConnectorSymbols::bind(&library)?;
        Ok(Self {
            registration: Mutex::new(None),
            symbols,
            library,
        })
    }

    /// The underlying library.
    #[must_use]
    pub const fn library(&self) -> &LoadedLibrary {
        &self.library
    }

    /// Whether the library exports `sendPluginMessage`.
    #[must_use]
    pub const fn supports_plugin_messages(&self) -> bool {
        self.symbols.send_plugin_message.is_some()
    }
}

fn c_string(field: &'static str, value: &str) -> Result<CString, AgentError> {
    CString::new(value).map_err(|_| AgentError::InvalidString { field })
}

impl AgentLibrary for NativeConnector {
    fn initialize(
        &self,
        identity: &AgentIdentity,
        sink: Arc<dyn MessageSink>,
    ) -> Result<(), AgentError> {
        let agent_name = c_string("agent_name", &identity.agent_name)?;
        let admin_address = c_string("admin_address", &identity.admin_address)?;
        let build_version = c_string("build_version", &identity.build_version)?;
        let group_id = c_string("group_id", &identity.group_id)?;
        let instance_id_policy = c_string("instance_id_policy", &identity.instance_id_policy)?;

        let mut registration = self
            .registration
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if registration.is_some() {
            return Err(AgentError::CallbackInUse);
        }

        // SAFETY: bound from the live library owned by `self`.
        let table = unsafe { (self.symbols.symbol_table)() };
        if table.is_null() {
            tracing::warn!(library = self.library.name(), "Connector returned no symbol table");
        }

        // Registered first: the connector may call back before returning.
        *registration = Some(callback::register(sink)?);

        tracing::info!(
            library = self.library.name(),
            agent_name = %identity.agent_name,
            admin_address = %identity.admin_address,
            "Initializing agent"
        );
        // SAFETY: all strings outlive the call; the callback never unwinds.
        unsafe {
            (self.symbols.initialize_agent)(
                agent_name.as_ptr(),
                admin_address.as_ptr(),
                build_version.as_ptr(),
                group_id.as_ptr(),
                instance_id_policy.as_ptr(),
                callback::receive_message,
            );
        }
        tracing::debug!("Agent initialized");

        Ok(())
    }

    fn send(&self, route: &str, payload: &str) -> Result<(), AgentError> {
        let route_c = c_string("route", route)?;
        let payload_c = c_string("payload", payload)?;

        tracing::debug!(route, payload, "Sending message");
        // SAFETY: bound from the live library owned by `self`; strings outlive the call.
        unsafe { (self.symbols.send_message)(route_c.as_ptr(), payload_c.as_ptr()) };
        Ok(())
    }

    fn send_plugin_message(&self, plugin_id: &str, payload: &str) -> Result<(), AgentError> {
        let send = self
            .symbols
            .send_plugin_message
            .ok_or(AgentError::Unsupported(crate::symbols::SEND_PLUGIN_MESSAGE))?;
        let plugin_id_c = c_string("plugin_id", plugin_id)?;
        let payload_c = c_string("payload", payload)?;

        tracing::debug!(plugin_id, payload, "Sending plugin message");
        // SAFETY: as in `send`.
        unsafe { send(plugin_id_c.as_ptr(), payload_c.as_ptr()) };
        Ok(())
    }
}
