//! Lifecycle controller: module load and unload.
//!
//! Load builds, in order: attachment context, global resource registry, logger
//! registration, mirrored configuration, dispatch registration. Unload walks
//! the same list backwards. Load failures are fatal and raised on the runtime
//! once; unload failures are logged and reported, never raised.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::attach::AttachContext;
use crate::bridge::callback::{CallbackThunk, ThunkStats};
use crate::config::BridgeConfig;
use crate::engine::HookEngine;
use crate::error::{FatalInit, SoftTeardownFailure};
use crate::logging::LogSink;
use crate::properties::MirroredConfig;
use crate::registry::GlobalResourceRegistry;
use crate::runtime::{InterfaceVersion, ManagedRuntime};

/// Everything one load cycle owns.
struct Loaded {
    attach: Arc<AttachContext>,
    registry: Arc<GlobalResourceRegistry>,
    mirrored: MirroredConfig,
    thunk: Arc<CallbackThunk>,
}

/// What unload managed to do.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnloadReport {
    /// `false` when there was nothing to unload.
    pub was_loaded: bool,
    pub properties_cleared: usize,
    pub descriptors_released: usize,
    /// Final delivery counters of the unregistered thunk.
    pub stats: ThunkStats,
    pub warnings: Vec<SoftTeardownFailure>,
}

/// The bridge between one native engine and whichever runtime loads it.
pub struct Bridge {
    engine: Arc<dyn HookEngine>,
    config: BridgeConfig,
    state: Mutex<Option<Loaded>>,
}

impl Bridge {
    pub fn new(engine: Arc<dyn HookEngine>, config: BridgeConfig) -> Self {
        Self {
            engine,
            config,
            state: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn is_loaded(&self) -> bool {
        self.state.lock().is_some()
    }

    /// Negotiated version of the current load cycle.
    pub fn version(&self) -> Option<InterfaceVersion> {
        self.state.lock().as_ref().map(|loaded| loaded.attach.version())
    }

    /// Registry of the current load cycle.
    pub fn registry(&self) -> Option<Arc<GlobalResourceRegistry>> {
        self.state
            .lock()
            .as_ref()
            .map(|loaded| Arc::clone(&loaded.registry))
    }

    /// Module load entry point.
    ///
    /// Returns the negotiated interface version. On failure the fatal signal
    /// has already been raised on `runtime`, and nothing built so far is left
    /// registered with the engine.
    pub fn on_load(&self, runtime: Arc<dyn ManagedRuntime>) -> Result<InterfaceVersion, FatalInit> {
        let mut state = self.state.lock();
        if let Some(previous) = state.take() {
            tracing::warn!("load requested while already loaded, tearing down the previous cycle");
            let previous_runtime = Arc::clone(previous.attach.runtime());
            self.teardown(previous, previous_runtime.as_ref());
        }

        match self.load(&runtime) {
            Ok(loaded) => {
                let version = loaded.attach.version();
                *state = Some(loaded);
                tracing::debug!(%version, "native hook bridge loaded");
                Ok(version)
            }
            Err(err) => {
                tracing::error!("native hook bridge failed to load: {err}");
                runtime.raise_fatal(&err.to_string());
                Err(err)
            }
        }
    }

    fn load(&self, runtime: &Arc<dyn ManagedRuntime>) -> Result<Loaded, FatalInit> {
        let (attach, env) =
            AttachContext::acquire(Arc::clone(runtime), self.config.interface_version)?;
        let attach = Arc::new(attach);

        let registry = Arc::new(GlobalResourceRegistry::new());
        registry.populate(env.as_ref())?;

        let thunk = Arc::new(CallbackThunk::new(
            Arc::clone(&attach),
            Arc::clone(&registry),
            LogSink::new(self.config.quiet),
        ));
        self.engine.set_logger(Some(Arc::clone(&thunk)));

        let mut mirrored = MirroredConfig::new(self.config.property_prefix.as_str());
        let properties = self.engine.native_properties();
        if let Err(err) = mirrored.apply(env.as_ref(), &properties) {
            self.engine.set_logger(None);
            for failure in mirrored.clear(env.as_ref()) {
                tracing::warn!("rollback: {failure}");
            }
            for failure in registry.destroy(Some(env.as_ref())).failures {
                tracing::warn!("rollback: {failure}");
            }
            return Err(err);
        }

        self.engine.set_dispatch(Some(Arc::clone(&thunk)));

        Ok(Loaded {
            attach,
            registry,
            mirrored,
            thunk,
        })
    }

    /// Module unload entry point. Never panics and never raises on the runtime.
    pub fn on_unload(&self, runtime: &dyn ManagedRuntime) -> UnloadReport {
        let Some(loaded) = self.state.lock().take() else {
            tracing::debug!("unload requested but the bridge is not loaded");
            return UnloadReport::default();
        };

        panic::catch_unwind(AssertUnwindSafe(|| self.teardown(loaded, runtime))).unwrap_or_else(
            |_| {
                let failure = SoftTeardownFailure::Panicked("unload teardown".to_string());
                tracing::warn!("{failure}");
                UnloadReport {
                    was_loaded: true,
                    warnings: vec![failure],
                    ..Default::default()
                }
            },
        )
    }

    fn teardown(&self, loaded: Loaded, runtime: &dyn ManagedRuntime) -> UnloadReport {
        let Loaded {
            attach,
            registry,
            mut mirrored,
            thunk,
        } = loaded;

        // No dispatch or log call can be in flight once these return.
        self.engine.set_dispatch(None);
        self.engine.set_logger(None);

        let mut report = UnloadReport {
            was_loaded: true,
            stats: thunk.stats(),
            ..Default::default()
        };

        let env = match runtime.env(attach.version()) {
            Ok(env) => Some(env),
            Err(source) => {
                let failure = SoftTeardownFailure::NoEnvironment(source);
                tracing::warn!("{failure}, leaving mirrored properties in place");
                report.warnings.push(failure);
                None
            }
        };

        match env.as_deref() {
            Some(env) => {
                let written = mirrored.applied().len();
                let failures = mirrored.clear(env);
                report.properties_cleared = written - failures.len();
                report.warnings.extend(failures);
            }
            None => {
                mirrored.forget();
            }
        }

        let teardown = registry.destroy(env.as_deref());
        report.descriptors_released = teardown.released;
        report.warnings.extend(teardown.failures);

        tracing::debug!(
            released = report.descriptors_released,
            warnings = report.warnings.len(),
            "native hook bridge unloaded"
        );
        report
    }
}
