//! The callback thunk registered with the native engine.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::attach::AttachContext;
use crate::bridge::boundary::Boundary;
use crate::error::DispatchFailure;
use crate::event::{self, RawEvent};
use crate::logging::{LogLevel, LogSink};
use crate::registry::GlobalResourceRegistry;

const DISPATCH_BOUNDARY: Boundary = Boundary::new("dispatch");
const LOGGER_BOUNDARY: Boundary = Boundary::new("logger");

/// What happened to one native event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Dispatched,
    /// Decoded fine but not meant for the runtime (hook lifecycle).
    Skipped,
}

/// Per-thunk delivery counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ThunkStats {
    pub dispatched: u64,
    pub skipped: u64,
    pub dropped: u64,
}

/// Entry point the engine's worker thread calls into.
///
/// Safe to invoke concurrently from any number of threads. Every entry first
/// makes sure the calling thread is attached, and nothing raised inside
/// (error or panic) reaches the caller.
pub struct CallbackThunk {
    attach: Arc<AttachContext>,
    registry: Arc<GlobalResourceRegistry>,
    sink: LogSink,
    dispatched: AtomicU64,
    skipped: AtomicU64,
    dropped: AtomicU64,
}

impl CallbackThunk {
    pub fn new(
        attach: Arc<AttachContext>,
        registry: Arc<GlobalResourceRegistry>,
        sink: LogSink,
    ) -> Self {
        Self {
            attach,
            registry,
            sink,
            dispatched: AtomicU64::new(0),
            skipped: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    /// Translate and deliver one native event. Returns `None` if it was dropped.
    pub fn on_native_event(&self, raw: &RawEvent) -> Option<Delivery> {
        let outcome = DISPATCH_BOUNDARY.contain(|| self.deliver(raw));
        let counter = match outcome {
            Some(Delivery::Dispatched) => &self.dispatched,
            Some(Delivery::Skipped) => &self.skipped,
            None => &self.dropped,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        outcome
    }

    fn deliver(&self, raw: &RawEvent) -> Result<Delivery, DispatchFailure> {
        let env = self
            .attach
            .ensure_attached()
            .map_err(DispatchFailure::Attach)?;
        let table = self.registry.snapshot()?;
        let Some(event) = event::translate(raw, &table)? else {
            return Ok(Delivery::Skipped);
        };
        if tracing::enabled!(tracing::Level::TRACE) {
            if let Ok(json) = serde_json::to_string(&event.event) {
                tracing::trace!(event = %json, "dispatching native event");
            }
        }
        env.dispatch(table.dispatch_target(), &event)
            .map_err(DispatchFailure::Delivery)?;
        Ok(Delivery::Dispatched)
    }

    /// Forward one engine log line. Returns whether it was emitted; `false`
    /// also when the calling thread cannot be attached.
    pub fn on_log_message(&self, level: LogLevel, message: &str) -> bool {
        LOGGER_BOUNDARY
            .contain(|| {
                self.attach
                    .ensure_attached()
                    .map_err(DispatchFailure::Attach)?;
                Ok(self.sink.emit(level, message))
            })
            .unwrap_or(false)
    }

    pub fn stats(&self) -> ThunkStats {
        ThunkStats {
            dispatched: self.dispatched.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}
