//! Scripted engine that drives the registered thunk from threads it owns.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use parking_lot::{Mutex, RwLock};

use crate::bridge::callback::CallbackThunk;
use crate::engine::HookEngine;
use crate::event::RawEvent;
use crate::logging::LogLevel;
use crate::properties::NativeProperties;

#[derive(Default)]
struct Slots {
    logger: RwLock<Option<Arc<CallbackThunk>>>,
    dispatch: RwLock<Option<Arc<CallbackThunk>>>,
    properties: Mutex<NativeProperties>,
    dispatch_registrations: AtomicUsize,
    logger_registrations: AtomicUsize,
}

/// A [`HookEngine`] whose events come from the caller instead of the OS.
///
/// Each `emit*` call delivers on freshly spawned engine threads, none of which
/// are attached to any runtime. A slot's read lock is held for the duration of
/// each call, so clearing a slot waits for in-flight calls to return.
#[derive(Clone, Default)]
pub struct SyntheticEngine {
    slots: Arc<Slots>,
}

impl SyntheticEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_properties(self, properties: NativeProperties) -> Self {
        *self.slots.properties.lock() = properties;
        self
    }

    pub fn is_dispatch_registered(&self) -> bool {
        self.slots.dispatch.read().is_some()
    }

    pub fn is_logger_registered(&self) -> bool {
        self.slots.logger.read().is_some()
    }

    /// Number of times a dispatch thunk was installed.
    pub fn dispatch_registrations(&self) -> usize {
        self.slots.dispatch_registrations.load(Ordering::Acquire)
    }

    pub fn logger_registrations(&self) -> usize {
        self.slots.logger_registrations.load(Ordering::Acquire)
    }

    /// Deliver `events` in order on one engine thread. Returns how many found
    /// a registered thunk.
    pub fn emit(&self, events: Vec<RawEvent>) -> usize {
        self.emit_concurrently(1, events)
    }

    /// Deliver a copy of `events` on each of `threads` engine threads at once.
    pub fn emit_concurrently(&self, threads: usize, events: Vec<RawEvent>) -> usize {
        let events = Arc::new(events);
        let workers: Vec<_> = (0..threads)
            .filter_map(|n| {
                let slots = Arc::clone(&self.slots);
                let events = Arc::clone(&events);
                thread::Builder::new()
                    .name(format!("synthetic-hook-{n}"))
                    .spawn(move || {
                        let mut delivered = 0;
                        for event in events.iter() {
                            if let Some(thunk) = slots.dispatch.read().as_ref() {
                                thunk.on_native_event(event);
                                delivered += 1;
                            }
                        }
                        delivered
                    })
                    .map_err(|e| tracing::error!("failed to spawn engine thread: {e}"))
                    .ok()
            })
            .collect();
        workers
            .into_iter()
            .map(|worker| worker.join().unwrap_or(0))
            .sum()
    }

    /// Push a log line through the logger slot on the calling thread.
    pub fn log(&self, level: LogLevel, message: &str) -> bool {
        match self.slots.logger.read().as_ref() {
            Some(thunk) => thunk.on_log_message(level, message),
            None => false,
        }
    }
}

impl HookEngine for SyntheticEngine {
    fn set_logger(&self, thunk: Option<Arc<CallbackThunk>>) {
        if thunk.is_some() {
            self.slots.logger_registrations.fetch_add(1, Ordering::AcqRel);
        }
        *self.slots.logger.write() = thunk;
    }

    fn set_dispatch(&self, thunk: Option<Arc<CallbackThunk>>) {
        if thunk.is_some() {
            self.slots.dispatch_registrations.fetch_add(1, Ordering::AcqRel);
        }
        *self.slots.dispatch.write() = thunk;
    }

    fn native_properties(&self) -> NativeProperties {
        *self.slots.properties.lock()
    }
}
