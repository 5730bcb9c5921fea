//! Minimal native connector for exercising the FFI path in tests.
//!
//! Exports the entry points the loader binds. `initialize_agent` greets the
//! host with `("10", "hello")` through the supplied callback, and every call
//! is recorded so tests can read it back through `fixture_last_call`.

#![allow(unsafe_code)]

use std::{
    ffi::{CStr, CString, c_char, c_void},
    ptr,
    sync::{Mutex, PoisonError},
};

type ReceiveCallback = extern "C" fn(*const c_char, *const c_char);

static SYMBOL_TABLE: u8 = 0;

static LAST_CALL: Mutex<Option<CString>> = Mutex::new(None);

/// # Safety
/// `text` must be null or point to a NUL-terminated string.
unsafe fn owned(text: *const c_char) -> String {
    if text.is_null() {
        return String::new();
    }
    // SAFETY: non-null and NUL-terminated per the caller.
    unsafe { CStr::from_ptr(text) }
        .to_string_lossy()
        .into_owned()
}

fn record(call: String) {
    *LAST_CALL.lock().unwrap_or_else(PoisonError::into_inner) = CString::new(call).ok();
}

#[unsafe(no_mangle)]
pub extern "C" fn agent_connector_symbols() -> *mut c_void {
    ptr::from_ref(&SYMBOL_TABLE).cast_mut().cast()
}

/// # Safety
/// Every string argument must be null or NUL-terminated.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn initialize_agent(
    agent_name: *const c_char,
    admin_address: *const c_char,
    build_version: *const c_char,
    group_id: *const c_char,
    instance_id_policy: *const c_char,
    on_message: ReceiveCallback,
) {
    // SAFETY: forwarded to the caller.
    let identity = unsafe {
        [
            owned(agent_name),
            owned(admin_address),
            owned(build_version),
            owned(group_id),
            owned(instance_id_policy),
        ]
    };
    record(format!("initialize_agent({})", identity.join(",")));
    on_message(c"10".as_ptr(), c"hello".as_ptr());
}

/// # Safety
/// Both arguments must be null or NUL-terminated.
#[allow(non_snake_case)]
#[unsafe(no_mangle)]
pub unsafe extern "C" fn sendMessage(route: *const c_char, payload: *const c_char) {
    // SAFETY: forwarded to the caller.
    let (route, payload) = unsafe { (owned(route), owned(payload)) };
    record(format!("sendMessage({route},{payload})"));
}

/// # Safety
/// Both arguments must be null or NUL-terminated.
#[allow(non_snake_case)]
#[unsafe(no_mangle)]
pub unsafe extern "C" fn sendPluginMessage(plugin_id: *const c_char, payload: *const c_char) {
    // SAFETY: forwarded to the caller.
    let (plugin_id, payload) = unsafe { (owned(plugin_id), owned(payload)) };
    record(format!("sendPluginMessage({plugin_id},{payload})"));
}

/// Most recent recorded call, or null before the first one.
///
/// The pointer stays valid until the next exported call records over it.
#[unsafe(no_mangle)]
pub extern "C" fn fixture_last_call() -> *const c_char {
    LAST_CALL
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .as_ref()
        .map_or(ptr::null(), |call| call.as_ptr())
}
