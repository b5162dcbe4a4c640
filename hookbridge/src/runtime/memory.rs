//! In-process reference runtime.
//!
//! Behaves like an embedding runtime as far as the bridge can observe: per-thread
//! attachment, a descriptor table with liveness tracking, a property store, a
//! dispatch target and a fatal-signal channel. Failure injection points cover
//! every path the lifecycle controller and the callback thunk must survive.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, ThreadId};

use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};

use crate::error::RuntimeError;
use crate::runtime::{
    Descriptor, DescriptorSpec, DispatchTarget, Environment, InterfaceVersion, ManagedEvent,
    ManagedRuntime,
};

/// Called for every dispatch, on the dispatching thread, before the event is
/// recorded.
type Listener = Arc<dyn Fn(&ManagedEvent) -> Result<(), RuntimeError> + Send + Sync>;

/// One event accepted by the dispatch target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchRecord {
    pub thread: ThreadId,
    pub target: DispatchTarget,
    pub event: ManagedEvent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Attachment {
    daemon: bool,
}

struct Shared {
    max_version: InterfaceVersion,
    alive: AtomicBool,
    refuse_env: AtomicBool,
    attached: DashMap<ThreadId, Attachment>,
    attach_calls: AtomicUsize,
    next_descriptor: AtomicU64,
    live: DashMap<Descriptor, DescriptorSpec>,
    unresolvable: Mutex<HashSet<DescriptorSpec>>,
    properties: DashMap<String, String>,
    read_only_properties: Mutex<HashSet<String>>,
    listener: RwLock<Option<Listener>>,
    dispatched: Mutex<Vec<DispatchRecord>>,
    fatal: Mutex<Vec<String>>,
}

/// Cheaply cloneable handle; clones share state.
#[derive(Clone)]
pub struct MemoryRuntime {
    shared: Arc<Shared>,
}

impl MemoryRuntime {
    /// New runtime accepting every version up to 1.8. The calling thread is
    /// attached, the way a loader thread is.
    pub fn new() -> Self {
        Self::with_max_version(InterfaceVersion::V1_8)
    }

    pub fn with_max_version(max_version: InterfaceVersion) -> Self {
        let runtime = Self {
            shared: Arc::new(Shared {
                max_version,
                alive: AtomicBool::new(true),
                refuse_env: AtomicBool::new(false),
                attached: DashMap::new(),
                attach_calls: AtomicUsize::new(0),
                next_descriptor: AtomicU64::new(1),
                live: DashMap::new(),
                unresolvable: Mutex::new(HashSet::new()),
                properties: DashMap::new(),
                read_only_properties: Mutex::new(HashSet::new()),
                listener: RwLock::new(None),
                dispatched: Mutex::new(Vec::new()),
                fatal: Mutex::new(Vec::new()),
            }),
        };
        runtime
            .shared
            .attached
            .insert(thread::current().id(), Attachment { daemon: false });
        runtime
    }

    // ─── Failure injection ───────────────────────────────────────────

    /// Simulate process teardown: every later call fails with `Destroyed`.
    pub fn invalidate(&self) {
        self.shared.alive.store(false, Ordering::Release);
    }

    /// Make `env` fail with `Detached` on every thread. Attaching still works.
    pub fn refuse_env(&self, refuse: bool) {
        self.shared.refuse_env.store(refuse, Ordering::Release);
    }

    pub fn fail_resolution(&self, spec: DescriptorSpec) {
        self.shared.unresolvable.lock().insert(spec);
    }

    /// Reject writes and clears of `name`.
    pub fn make_read_only(&self, name: &str) {
        self.shared.read_only_properties.lock().insert(name.to_string());
    }

    pub fn set_listener(
        &self,
        listener: impl Fn(&ManagedEvent) -> Result<(), RuntimeError> + Send + Sync + 'static,
    ) {
        *self.shared.listener.write() = Some(Arc::new(listener));
    }

    pub fn detach_current_thread(&self) -> bool {
        self.shared.attached.remove(&thread::current().id()).is_some()
    }

    // ─── Inspection ──────────────────────────────────────────────────

    pub fn live_descriptors(&self) -> usize {
        self.shared.live.len()
    }

    pub fn is_live(&self, descriptor: Descriptor) -> bool {
        self.shared.live.contains_key(&descriptor)
    }

    pub fn property(&self, name: &str) -> Option<String> {
        self.shared.properties.get(name).map(|v| v.value().clone())
    }

    pub fn property_count(&self) -> usize {
        self.shared.properties.len()
    }

    pub fn is_attached(&self, thread: ThreadId) -> bool {
        self.shared.attached.contains_key(&thread)
    }

    /// Threads attached on demand (daemon attachments), excluding the loader.
    pub fn daemon_threads(&self) -> usize {
        self.shared.attached.iter().filter(|a| a.value().daemon).count()
    }

    pub fn attach_calls(&self) -> usize {
        self.shared.attach_calls.load(Ordering::Acquire)
    }

    pub fn dispatched(&self) -> Vec<DispatchRecord> {
        self.shared.dispatched.lock().clone()
    }

    pub fn fatal_signals(&self) -> Vec<String> {
        self.shared.fatal.lock().clone()
    }

    fn check(&self, version: InterfaceVersion) -> Result<(), RuntimeError> {
        if !self.shared.alive.load(Ordering::Acquire) {
            return Err(RuntimeError::Destroyed);
        }
        if version > self.shared.max_version {
            return Err(RuntimeError::UnsupportedVersion(version));
        }
        Ok(())
    }

    fn env_for(&self, version: InterfaceVersion) -> Box<dyn Environment> {
        Box::new(MemoryEnv {
            shared: Arc::clone(&self.shared),
            thread: thread::current().id(),
            version,
        })
    }
}

impl Default for MemoryRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl ManagedRuntime for MemoryRuntime {
    fn env(&self, version: InterfaceVersion) -> Result<Box<dyn Environment>, RuntimeError> {
        self.check(version)?;
        if self.shared.refuse_env.load(Ordering::Acquire)
            || !self.is_attached(thread::current().id())
        {
            return Err(RuntimeError::Detached);
        }
        Ok(self.env_for(version))
    }

    fn attach_current_thread(
        &self,
        version: InterfaceVersion,
    ) -> Result<Box<dyn Environment>, RuntimeError> {
        self.check(version)?;
        self.shared.attach_calls.fetch_add(1, Ordering::AcqRel);
        self.shared
            .attached
            .entry(thread::current().id())
            .or_insert(Attachment { daemon: true });
        Ok(self.env_for(version))
    }

    fn raise_fatal(&self, message: &str) {
        tracing::error!("fatal error raised: {message}");
        self.shared.fatal.lock().push(message.to_string());
    }
}

/// Thread-bound environment. Every call verifies it is used on the thread it
/// was obtained on, and that the runtime is still alive.
struct MemoryEnv {
    shared: Arc<Shared>,
    thread: ThreadId,
    version: InterfaceVersion,
}

impl MemoryEnv {
    fn check(&self) -> Result<(), RuntimeError> {
        if !self.shared.alive.load(Ordering::Acquire) {
            return Err(RuntimeError::Destroyed);
        }
        let current = thread::current().id();
        if current != self.thread || !self.shared.attached.contains_key(&current) {
            return Err(RuntimeError::Detached);
        }
        Ok(())
    }

    fn check_live(&self, descriptor: Descriptor) -> Result<(), RuntimeError> {
        if self.shared.live.contains_key(&descriptor) {
            Ok(())
        } else {
            Err(RuntimeError::StaleDescriptor(descriptor))
        }
    }

    fn check_writable(&self, name: &str) -> Result<(), RuntimeError> {
        if self.shared.read_only_properties.lock().contains(name) {
            return Err(RuntimeError::Raised(format!("property {name} is read-only")));
        }
        Ok(())
    }
}

impl Environment for MemoryEnv {
    fn version(&self) -> InterfaceVersion {
        self.version
    }

    fn resolve(&self, spec: &DescriptorSpec) -> Result<Descriptor, RuntimeError> {
        self.check()?;
        if self.shared.unresolvable.lock().contains(spec) {
            return Err(RuntimeError::Unresolved(spec.to_string()));
        }
        let raw = self.shared.next_descriptor.fetch_add(1, Ordering::AcqRel);
        let descriptor = Descriptor::new(raw).ok_or_else(|| RuntimeError::Unresolved(spec.to_string()))?;
        self.shared.live.insert(descriptor, *spec);
        Ok(descriptor)
    }

    fn release(&self, descriptor: Descriptor) -> Result<(), RuntimeError> {
        self.check()?;
        self.shared
            .live
            .remove(&descriptor)
            .map(|_| ())
            .ok_or(RuntimeError::StaleDescriptor(descriptor))
    }

    fn set_property(&self, name: &str, value: &str) -> Result<(), RuntimeError> {
        self.check()?;
        self.check_writable(name)?;
        self.shared.properties.insert(name.to_string(), value.to_string());
        Ok(())
    }

    fn clear_property(&self, name: &str) -> Result<(), RuntimeError> {
        self.check()?;
        self.check_writable(name)?;
        self.shared.properties.remove(name);
        Ok(())
    }

    fn dispatch(&self, target: DispatchTarget, event: &ManagedEvent) -> Result<(), RuntimeError> {
        self.check()?;
        for descriptor in [target.instance, target.method, event.class, event.constructor] {
            self.check_live(descriptor)?;
        }
        let listener = self.shared.listener.read().clone();
        if let Some(listener) = listener {
            listener(event)?;
        }
        self.shared.dispatched.lock().push(DispatchRecord {
            thread: self.thread,
            target,
            event: event.clone(),
        });
        Ok(())
    }
}
