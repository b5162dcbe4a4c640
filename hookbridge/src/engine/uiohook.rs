//! [`HookEngine`] over libuiohook.

use std::ffi::c_long;
use std::sync::Arc;

use crate::bridge::abi::{self, DispatchProc, LoggerProc};
use crate::bridge::callback::CallbackThunk;
use crate::engine::HookEngine;
use crate::properties::NativeProperties;

#[link(name = "uiohook")]
unsafe extern "C" {
    fn hook_set_logger_proc(logger: Option<LoggerProc>);
    fn hook_set_dispatch_proc(dispatcher: Option<DispatchProc>);
    fn hook_get_auto_repeat_rate() -> c_long;
    fn hook_get_auto_repeat_delay() -> c_long;
    fn hook_get_multi_click_time() -> c_long;
    fn hook_get_pointer_sensitivity() -> c_long;
    fn hook_get_pointer_acceleration_multiplier() -> c_long;
    fn hook_get_pointer_acceleration_threshold() -> c_long;
}

/// The process-wide libuiohook instance. Only one should be in use at a time.
#[derive(Debug, Default, Clone, Copy)]
pub struct UiohookEngine;

impl HookEngine for UiohookEngine {
    fn set_logger(&self, thunk: Option<Arc<CallbackThunk>>) {
        match thunk {
            Some(thunk) => {
                *abi::LOGGER.write() = Some(thunk);
                unsafe { hook_set_logger_proc(Some(abi::logger_trampoline)) };
            }
            None => {
                unsafe { hook_set_logger_proc(None) };
                *abi::LOGGER.write() = None;
            }
        }
    }

    fn set_dispatch(&self, thunk: Option<Arc<CallbackThunk>>) {
        match thunk {
            Some(thunk) => {
                *abi::DISPATCH.write() = Some(thunk);
                unsafe { hook_set_dispatch_proc(Some(abi::dispatch_trampoline)) };
            }
            None => {
                unsafe { hook_set_dispatch_proc(None) };
                *abi::DISPATCH.write() = None;
            }
        }
    }

    fn native_properties(&self) -> NativeProperties {
        // Negative values mean the platform could not report the setting.
        let read = |value: c_long| (value >= 0).then_some(i64::from(value));
        unsafe {
            NativeProperties {
                auto_repeat_rate: read(hook_get_auto_repeat_rate()),
                auto_repeat_delay: read(hook_get_auto_repeat_delay()),
                multi_click_interval: read(hook_get_multi_click_time()),
                pointer_sensitivity: read(hook_get_pointer_sensitivity()),
                pointer_acceleration_multiplier: read(hook_get_pointer_acceleration_multiplier()),
                pointer_acceleration_threshold: read(hook_get_pointer_acceleration_threshold()),
            }
        }
    }
}
