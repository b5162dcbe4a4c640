//! Error types for every failure class the bridge distinguishes.
//!
//! - [`FatalInit`]: load-time failures, escalated to the runtime exactly once.
//! - [`SoftTeardownFailure`]: unload-time failures, logged and reported, never raised.
//! - [`DispatchFailure`]: callback-time failures, contained at the thunk boundary.

use crate::registry::DescriptorKey;
use crate::runtime::{Descriptor, InterfaceVersion};

/// Errors reported by a [`ManagedRuntime`](crate::runtime::ManagedRuntime) or one of
/// its environments.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuntimeError {
    /// The calling thread has no environment for this runtime.
    #[error("current thread is not attached to the runtime")]
    Detached,
    /// The runtime refused the requested interface version.
    #[error("interface version {0} is not supported")]
    UnsupportedVersion(InterfaceVersion),
    /// The runtime handle is gone (process teardown).
    #[error("runtime has been destroyed")]
    Destroyed,
    /// A descriptor could not be resolved by name.
    #[error("unable to resolve {0}")]
    Unresolved(String),
    /// A descriptor was used after it had been released.
    #[error("descriptor {0} is not live")]
    StaleDescriptor(Descriptor),
    /// The runtime raised a condition of its own while servicing a call.
    #[error("runtime raised: {0}")]
    Raised(String),
}

/// Unrecoverable load failure. The module is unusable once one of these is raised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FatalInit {
    #[error("failed to acquire runtime interface (version {version}): {source}")]
    Attach {
        version: InterfaceVersion,
        source: RuntimeError,
    },
    #[error("failed to locate required descriptor {key}: {source}")]
    Registry {
        key: DescriptorKey,
        source: RuntimeError,
    },
    #[error("failed to mirror native property {name}: {source}")]
    Property { name: String, source: RuntimeError },
}

/// Cleanup step that could not complete during unload.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SoftTeardownFailure {
    #[error("no runtime environment on the unloading thread: {0}")]
    NoEnvironment(RuntimeError),
    #[error("failed to clear property {name}: {source}")]
    ClearProperty { name: String, source: RuntimeError },
    #[error("failed to release descriptor {key}: {source}")]
    Release {
        key: DescriptorKey,
        source: RuntimeError,
    },
    #[error("{count} descriptors dropped without a runtime environment")]
    ReleasedLocally { count: usize },
    #[error("teardown panicked: {0}")]
    Panicked(String),
}

/// Lookup against a registry that is not populated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("global resource registry is not populated")]
    Unpopulated,
}

/// A native event record that cannot be turned into a managed event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TranslateError {
    #[error("native engine delivered a null event")]
    Null,
    #[error("unknown native event type {0}")]
    UnknownType(u32),
}

/// Anything that goes wrong between the engine calling the thunk and the
/// runtime accepting the event. Never crosses back into the engine.
#[derive(Debug, thiserror::Error)]
pub enum DispatchFailure {
    #[error("unable to attach native thread: {0}")]
    Attach(#[source] RuntimeError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error("translation failed: {0}")]
    Translate(#[from] TranslateError),
    #[error("delivery failed: {0}")]
    Delivery(#[source] RuntimeError),
    #[error("callback panicked: {0}")]
    Panicked(String),
}

/// Invalid bridge configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid bridge configuration: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid interface version {0:?}")]
    Version(String),
}
