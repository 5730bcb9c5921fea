//! Owned handle to a dynamically loaded library.

use std::{
    ffi::OsString,
    mem::ManuallyDrop,
    path::{Path, PathBuf},
};

use agent_connector_core::LibraryLocation;
use libloading::Library;

use crate::error::LoadError;

/// Unique owner of one mapped shared library.
///
/// The library is unmapped exactly once, when the handle is dropped. A failed
/// unmap is logged and otherwise ignored.
pub struct LoadedLibrary {
    name: String,
    path: PathBuf,
    library: ManuallyDrop<Library>,
}

impl std::fmt::Debug for LoadedLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedLibrary")
            .field("name", &self.name)
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl LoadedLibrary {
    /// Map the library described by `location`.
    ///
    /// # Errors
    /// Returns [`LoadError`] naming the library if it is absent, malformed
    /// or incompatible.
    pub fn load(location: &LibraryLocation) -> Result<Self, LoadError> {
        let path = resolve_path(location)?;
        Self::open(location.display_name(), path)
    }

    /// Map the library at `path`, reporting failures under `name`.
    ///
    /// # Errors
    /// Returns [`LoadError::Open`] if the platform loader fails.
    pub fn open(name: impl Into<String>, path: impl Into<PathBuf>) -> Result<Self, LoadError> {
        let name = name.into();
        let path = path.into();
        tracing::debug!(library = %name, path = %path.display(), "Loading library");

        // SAFETY: mapping runs the library's initializers; loading a given
        // connector is the host's trust decision.
        let library = unsafe { Library::new(&path) }.map_err(|source| LoadError::Open {
            name: name.clone(),
            source,
        })?;

        Ok(Self {
            name,
            path,
            library: ManuallyDrop::new(library),
        })
    }

    /// Name used in diagnostics.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Path handed to the platform loader.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn raw(&self) -> &Library {
        &self.library
    }
}

impl Drop for LoadedLibrary {
    fn drop(&mut self) {
        // SAFETY: taken exactly once, here; the field is never touched again.
        let library = unsafe { ManuallyDrop::take(&mut self.library) };
        match library.close() {
            Ok(()) => tracing::debug!(library = %self.name, "Unloaded library"),
            Err(e) => tracing::warn!(library = %self.name, error = %e, "Failed to unload library"),
        }
    }
}

/// Turn a location into the path passed to the platform loader.
///
/// Bare names without an extension become platform file names
/// (`libname.so`, `name.dll`, `libname.dylib`).
///
/// # Errors
/// Returns [`LoadError::ExecutableDir`] if the executable directory is needed
/// but cannot be determined.
pub fn resolve_path(location: &LibraryLocation) -> Result<PathBuf, LoadError> {
    match location {
        LibraryLocation::Path(path) => Ok(path.clone()),
        LibraryLocation::SearchPath(name) => Ok(PathBuf::from(platform_file_name(name))),
        LibraryLocation::NextToExecutable(name) => {
            let exe = std::env::current_exe().map_err(|source| LoadError::ExecutableDir {
                name: name.clone(),
                source,
            })?;
            let dir = exe.parent().map(Path::to_path_buf).unwrap_or_default();
            let path = dir.join(platform_file_name(name));
            tracing::debug!(path = %path.display(), "Resolved library next to executable");
            Ok(path)
        }
    }
}

fn platform_file_name(name: &str) -> OsString {
    if Path::new(name).extension().is_some() {
        OsString::from(name)
    } else {
        libloading::library_filename(name)
    }
}
