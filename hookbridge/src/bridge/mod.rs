//! Everything that runs on, or is handed to, the native engine.

#[cfg(feature = "uiohook")]
pub mod abi;
pub mod boundary;
pub mod callback;
