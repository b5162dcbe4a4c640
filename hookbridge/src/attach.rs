//! Attachment context: the runtime handle and negotiated version, shared with
//! every thread that needs to call into the runtime.

use std::fmt;
use std::sync::Arc;

use crate::error::{FatalInit, RuntimeError};
use crate::runtime::{Environment, InterfaceVersion, ManagedRuntime};

/// Lifecycle-scoped handle to the embedding runtime.
///
/// Holds no per-thread state. Environments are derived on demand and dropped by
/// the caller; attachment itself is tracked by the runtime, per thread.
pub struct AttachContext {
    runtime: Arc<dyn ManagedRuntime>,
    version: InterfaceVersion,
}

impl AttachContext {
    /// Negotiate `requested` on the loading thread. The returned environment
    /// belongs to that thread only.
    pub fn acquire(
        runtime: Arc<dyn ManagedRuntime>,
        requested: InterfaceVersion,
    ) -> Result<(Self, Box<dyn Environment>), FatalInit> {
        let env = runtime.env(requested).map_err(|source| FatalInit::Attach {
            version: requested,
            source,
        })?;
        tracing::debug!(version = %requested, "acquired runtime interface");
        Ok((
            Self {
                runtime,
                version: requested,
            },
            env,
        ))
    }

    pub fn version(&self) -> InterfaceVersion {
        self.version
    }

    pub fn runtime(&self) -> &Arc<dyn ManagedRuntime> {
        &self.runtime
    }

    /// Environment of the calling thread, without attaching it.
    pub fn current_env(&self) -> Result<Box<dyn Environment>, RuntimeError> {
        self.runtime.env(self.version)
    }

    /// Environment of the calling thread, attaching it first if it never was.
    ///
    /// Fails only when the runtime is gone or refuses the stored version.
    pub fn ensure_attached(&self) -> Result<Box<dyn Environment>, RuntimeError> {
        match self.runtime.env(self.version) {
            Err(RuntimeError::Detached) => {
                tracing::debug!(
                    thread = ?std::thread::current().id(),
                    "attaching native thread to runtime"
                );
                self.runtime.attach_current_thread(self.version)
            }
            other => other,
        }
    }
}

impl fmt::Debug for AttachContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttachContext")
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::memory::MemoryRuntime;

    fn context(runtime: &MemoryRuntime) -> AttachContext {
        let (ctx, _env) =
            AttachContext::acquire(Arc::new(runtime.clone()), InterfaceVersion::V1_4).unwrap();
        ctx
    }

    #[test]
    fn test_acquire_on_loader_thread() {
        let runtime = MemoryRuntime::new();
        let (ctx, env) =
            AttachContext::acquire(Arc::new(runtime.clone()), InterfaceVersion::V1_4).unwrap();
        assert_eq!(ctx.version(), InterfaceVersion::V1_4);
        assert_eq!(env.version(), InterfaceVersion::V1_4);
    }

    #[test]
    fn test_acquire_unsupported_version() {
        let runtime = MemoryRuntime::with_max_version(InterfaceVersion::V1_2);
        let Err(err) = AttachContext::acquire(Arc::new(runtime), InterfaceVersion::V1_4) else {
            panic!("acquire should refuse an unsupported version");
        };
        assert_eq!(
            err,
            FatalInit::Attach {
                version: InterfaceVersion::V1_4,
                source: RuntimeError::UnsupportedVersion(InterfaceVersion::V1_4),
            }
        );
    }

    #[test]
    fn test_ensure_attached_from_foreign_thread() {
        let runtime = MemoryRuntime::new();
        let ctx = Arc::new(context(&runtime));

        let worker = {
            let ctx = Arc::clone(&ctx);
            std::thread::spawn(move || {
                assert_eq!(ctx.current_env().err(), Some(RuntimeError::Detached));
                let env = ctx.ensure_attached().unwrap();
                assert_eq!(env.version(), InterfaceVersion::V1_4);
                // Second call finds the existing attachment.
                ctx.ensure_attached().unwrap();
                std::thread::current().id()
            })
        };
        let worker_id = worker.join().unwrap();

        assert!(runtime.is_attached(worker_id));
        assert_eq!(runtime.attach_calls(), 1);
    }

    #[test]
    fn test_ensure_attached_after_runtime_destroyed() {
        let runtime = MemoryRuntime::new();
        let ctx = Arc::new(context(&runtime));
        runtime.invalidate();

        let result = {
            let ctx = Arc::clone(&ctx);
            std::thread::spawn(move || ctx.ensure_attached().err())
                .join()
                .unwrap()
        };
        assert_eq!(result, Some(RuntimeError::Destroyed));
        assert_eq!(ctx.ensure_attached().err(), Some(RuntimeError::Destroyed));
    }
}
