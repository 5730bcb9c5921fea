//! Dynamic loading and binding of the native agent connector.
//!
//! Provides:
//! - `LoadedLibrary` - Owned handle with logged, exactly-once release
//! - `ConnectorSymbols` - Typed entry points, resolved eagerly
//! - `NativeConnector` - `AgentLibrary` over the loaded connector

// FFI boundary: every unsafe block carries a SAFETY note.
#![allow(unsafe_code)]

mod callback;
pub mod connector;
pub mod error;
pub mod library;
pub mod symbols;

pub use connector::NativeConnector;
pub use error::{ConnectorError, LoadError, SymbolNotFoundError};
pub use library::LoadedLibrary;
pub use symbols::ConnectorSymbols;
