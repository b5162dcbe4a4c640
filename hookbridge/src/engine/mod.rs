//! The native hook engine as seen by the bridge: two single-slot callback
//! registrations and a source of native input settings.

#[cfg(feature = "uiohook")]
pub mod uiohook;
pub mod synthetic;

use std::sync::Arc;

use crate::bridge::callback::CallbackThunk;
use crate::properties::NativeProperties;

/// Registration surface of a native hook engine.
///
/// Each slot holds at most one thunk; registering replaces, `None` clears.
/// Once a clearing call returns, the engine makes no further calls through
/// that slot.
pub trait HookEngine: Send + Sync {
    fn set_logger(&self, thunk: Option<Arc<CallbackThunk>>);

    fn set_dispatch(&self, thunk: Option<Arc<CallbackThunk>>);

    fn native_properties(&self) -> NativeProperties;
}
