//! Lifecycle bridge between a native input-hook engine and the managed runtime
//! that loads it as a dynamic module.
//!
//! [`Bridge::on_load`] acquires the runtime interface, resolves every descriptor
//! the event path needs, mirrors native settings into runtime properties and
//! registers a [`CallbackThunk`] with the engine. From then on the engine's own
//! worker thread calls the thunk, which attaches that thread on demand and
//! delivers each event without ever letting a failure escape back into the
//! engine. [`Bridge::on_unload`] reverses all of it.

pub mod attach;
pub mod bridge;
pub mod config;
pub mod engine;
pub mod error;
pub mod event;
pub mod lifecycle;
pub mod logging;
pub mod properties;
pub mod registry;
pub mod runtime;

pub use bridge::callback::{CallbackThunk, Delivery, ThunkStats};
pub use config::BridgeConfig;
pub use engine::HookEngine;
pub use error::{DispatchFailure, FatalInit, RuntimeError, SoftTeardownFailure};
pub use lifecycle::{Bridge, UnloadReport};
pub use runtime::{Environment, InterfaceVersion, ManagedRuntime};
