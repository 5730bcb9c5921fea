//! Session behaviour through the real FFI path, against the fixture cdylib.
//!
//! The callback slot is process-wide, so every native scenario lives in one
//! test function.

#![allow(unsafe_code)]

use std::{
    env::consts::{DLL_PREFIX, DLL_SUFFIX},
    ffi::{CStr, c_char},
    path::{Path, PathBuf},
    process::Command,
};

use agent_connector_core::{ConnectorConfig, LibraryLocation};
use agent_connector_native::{LoadedLibrary, symbols};
use agent_connector_session::{NativeSession, SessionState};

/// Build the fixture into this test's scratch target dir and return its path.
fn build_fixture() -> PathBuf {
    let manifest =
        Path::new(env!("CARGO_MANIFEST_DIR")).join("../agent-connector-fixture/Cargo.toml");
    let target_dir = Path::new(env!("CARGO_TARGET_TMPDIR")).join("agent-connector-fixture");

    let status = Command::new(env!("CARGO"))
        .arg("build")
        .arg("--quiet")
        .arg("--manifest-path")
        .arg(&manifest)
        .arg("--target-dir")
        .arg(&target_dir)
        .status()
        .expect("failed to run cargo");
    assert!(status.success(), "building the fixture library failed");

    let path = target_dir
        .join("debug")
        .join(format!("{DLL_PREFIX}agent_connector_fixture{DLL_SUFFIX}"));
    assert!(path.exists(), "fixture not found at {}", path.display());
    path
}

/// Reads the fixture's record of the last call it received.
struct CallLog {
    last_call: unsafe extern "C" fn() -> *const c_char,
    _library: LoadedLibrary,
}

impl CallLog {
    fn open(path: &Path) -> Self {
        // A second handle to the same path shares the session's mapping.
        let library = LoadedLibrary::open("agent_connector_fixture", path).unwrap();
        // SAFETY: the fixture exports `fixture_last_call` with this signature.
        let last_call = unsafe { symbols::resolve(&library, "fixture_last_call") }.unwrap();
        Self {
            last_call,
            _library: library,
        }
    }

    fn last(&self) -> Option<String> {
        // SAFETY: the pointer is null or a live NUL-terminated string until the
        // next call into the fixture, and it is copied out immediately.
        unsafe {
            let ptr = (self.last_call)();
            (!ptr.is_null()).then(|| CStr::from_ptr(ptr).to_string_lossy().into_owned())
        }
    }
}

#[test]
fn test_native_hello_world() {
    let path = build_fixture();
    let calls = CallLog::open(&path);

    let config = ConnectorConfig {
        library: LibraryLocation::Path(path),
        ..ConnectorConfig::default()
    };
    let session = NativeSession::connect(config).unwrap();
    assert_eq!(session.state(), SessionState::Uninitialized);

    session.initialize_agent().unwrap();
    assert_eq!(
        calls.last().as_deref(),
        Some("initialize_agent(mysuperAgent,localhost:8090,1.0.0,group,fail)")
    );

    session.send("world").unwrap();
    assert_eq!(calls.last().as_deref(), Some("sendMessage(10,world)"));

    assert_eq!(session.try_next_message().as_deref(), Some("hello"));
    assert_eq!(session.try_next_message(), None);

    session.send_plugin_message("test2code", "{}").unwrap();
    assert_eq!(
        calls.last().as_deref(),
        Some("sendPluginMessage(test2code,{})")
    );

    session.terminate();
    assert_eq!(session.state(), SessionState::Terminated);
    assert!(session.send("late").is_err());
}
