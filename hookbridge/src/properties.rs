//! Native settings mirrored into runtime-visible properties.

use crate::error::{FatalInit, SoftTeardownFailure};
use crate::runtime::Environment;

/// Input settings reported by the native engine. `None` means the platform
/// could not provide the value; such keys are not mirrored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NativeProperties {
    pub auto_repeat_rate: Option<i64>,
    pub auto_repeat_delay: Option<i64>,
    pub multi_click_interval: Option<i64>,
    pub pointer_sensitivity: Option<i64>,
    pub pointer_acceleration_multiplier: Option<i64>,
    pub pointer_acceleration_threshold: Option<i64>,
}

impl NativeProperties {
    fn entries(&self) -> [(&'static str, Option<i64>); 6] {
        [
            ("key.repeat.rate", self.auto_repeat_rate),
            ("key.repeat.delay", self.auto_repeat_delay),
            ("button.multiclick.interval", self.multi_click_interval),
            ("pointer.sensitivity", self.pointer_sensitivity),
            ("pointer.acceleration.multiplier", self.pointer_acceleration_multiplier),
            ("pointer.acceleration.threshold", self.pointer_acceleration_threshold),
        ]
    }
}

/// Tracks which properties this bridge wrote, so unload clears exactly those.
#[derive(Debug, Default)]
pub struct MirroredConfig {
    prefix: String,
    applied: Vec<String>,
}

impl MirroredConfig {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            applied: Vec::new(),
        }
    }

    /// Push every reported value. Stops at the first refusal; what was already
    /// written stays tracked so a later [`clear`](Self::clear) removes it.
    pub fn apply(
        &mut self,
        env: &dyn Environment,
        properties: &NativeProperties,
    ) -> Result<usize, FatalInit> {
        for (suffix, value) in properties.entries() {
            let name = format!("{}.{suffix}", self.prefix);
            let Some(value) = value else {
                tracing::debug!("native source did not report {name}");
                continue;
            };
            env.set_property(&name, &value.to_string())
                .map_err(|source| FatalInit::Property {
                    name: name.clone(),
                    source,
                })?;
            tracing::trace!(%name, value, "mirrored native property");
            self.applied.push(name);
        }
        Ok(self.applied.len())
    }

    /// Clear every property this bridge wrote. Failures are returned, not raised.
    pub fn clear(&mut self, env: &dyn Environment) -> Vec<SoftTeardownFailure> {
        self.applied
            .drain(..)
            .rev()
            .filter_map(|name| match env.clear_property(&name) {
                Ok(()) => None,
                Err(source) => {
                    tracing::warn!("failed to clear property {name}: {source}");
                    Some(SoftTeardownFailure::ClearProperty { name, source })
                }
            })
            .collect()
    }

    /// Drop the bookkeeping without touching the runtime.
    pub fn forget(&mut self) -> usize {
        let count = self.applied.len();
        self.applied.clear();
        count
    }

    pub fn applied(&self) -> &[String] {
        &self.applied
    }
}
