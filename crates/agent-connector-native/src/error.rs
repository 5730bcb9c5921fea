//! Loading and binding errors.

use thiserror::Error;

/// The native library could not be mapped.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Cannot load {name}: {source}")]
    Open {
        name: String,
        #[source]
        source: libloading::Error,
    },
    #[error("Cannot locate {name}: executable directory unavailable: {source}")]
    ExecutableDir {
        name: String,
        #[source]
        source: std::io::Error,
    },
}

impl LoadError {
    /// Name of the library that failed to load.
    #[must_use]
    pub fn library_name(&self) -> &str {
        match self {
            Self::Open { name, .. } | Self::ExecutableDir { name, .. } => name,
        }
    }
}

/// A required entry point is missing from a loaded library.
#[derive(Debug, Error)]
#[error("Cannot get address of procedure: {symbol} in {library}: {source}")]
pub struct SymbolNotFoundError {
    pub symbol: String,
    pub library: String,
    #[source]
    pub source: libloading::Error,
}

/// Connector construction error.
#[derive(Debug, Error)]
pub enum ConnectorError {
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error(transparent)]
    Symbol(#[from] SymbolNotFoundError),
}
