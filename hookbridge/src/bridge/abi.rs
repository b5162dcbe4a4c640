//! C ABI trampolines handed to libuiohook.
//!
//! libuiohook callbacks carry no user data, so the registered thunks live in
//! process-wide slots. Each trampoline holds its slot's read lock for the
//! whole call; clearing a slot therefore waits for in-flight calls.

use std::ffi::{c_char, c_uint, CStr};
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;

use crate::bridge::callback::CallbackThunk;
use crate::event::RawEvent;
use crate::logging::LogLevel;

/// `dispatcher_t`: receives one event record owned by the engine.
pub type DispatchProc = unsafe extern "C" fn(event: *mut RawEvent);

/// `logger_t`. The engine passes a printf-style format followed by variadic
/// arguments; only the fixed arguments are read, so lines are logged
/// unformatted.
///
/// # Safety
///
/// The C side declares this variadic. Registering a non-variadic function
/// relies on the platform passing leading fixed arguments identically for
/// both, which holds on the SysV x86-64, AArch64 and Win64 calling
/// conventions this adapter is built for.
pub type LoggerProc = unsafe extern "C" fn(level: c_uint, format: *const c_char) -> bool;

pub(crate) static DISPATCH: Lazy<RwLock<Option<Arc<CallbackThunk>>>> =
    Lazy::new(|| RwLock::new(None));
pub(crate) static LOGGER: Lazy<RwLock<Option<Arc<CallbackThunk>>>> =
    Lazy::new(|| RwLock::new(None));

/// Registered with `hook_set_dispatch_proc`.
///
/// # Safety
///
/// `event` must be null or point to a record that stays valid for the call.
pub unsafe extern "C" fn dispatch_trampoline(event: *mut RawEvent) {
    let slot = DISPATCH.read();
    let Some(thunk) = slot.as_ref() else {
        return;
    };
    if event.is_null() {
        tracing::warn!("native engine delivered a null event, dropping");
        return;
    }
    thunk.on_native_event(unsafe { &*event });
}

/// Registered with `hook_set_logger_proc`.
///
/// # Safety
///
/// `format` must be null or a valid NUL-terminated C string.
pub unsafe extern "C" fn logger_trampoline(level: c_uint, format: *const c_char) -> bool {
    let slot = LOGGER.read();
    let Some(thunk) = slot.as_ref() else {
        return false;
    };
    if format.is_null() {
        return false;
    }
    let message = unsafe { CStr::from_ptr(format) }.to_string_lossy();
    let level = LogLevel::from_raw(level).unwrap_or(LogLevel::Info);
    thunk.on_log_message(level, &message)
}
