//! Global resource registry: every runtime descriptor the thunk needs, resolved
//! once at load so no lookup happens per event.
//!
//! The registry is either fully populated or empty. Readers take an immutable
//! [`DescriptorTable`] snapshot, so a lookup can never observe a half-built or
//! half-released table.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{FatalInit, RegistryError, SoftTeardownFailure};
use crate::runtime::{
    Descriptor, DescriptorKind, DescriptorSpec, DispatchTarget, Environment,
};

const DISPATCHER: &str = "hookbridge/GlobalScreen";
const INPUT_EVENT: &str = "hookbridge/NativeInputEvent";
const KEY_EVENT: &str = "hookbridge/keyboard/NativeKeyEvent";
const MOUSE_EVENT: &str = "hookbridge/mouse/NativeMouseEvent";
const WHEEL_EVENT: &str = "hookbridge/mouse/NativeMouseWheelEvent";

/// Fixed set of logical keys the registry resolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DescriptorKey {
    DispatcherClass,
    DispatcherInstance,
    DispatchMethod,
    InputEventClass,
    InputEventWhenField,
    InputEventModifiersField,
    KeyEventClass,
    KeyEventConstructor,
    MouseEventClass,
    MouseEventConstructor,
    MouseWheelEventClass,
    MouseWheelEventConstructor,
}

impl DescriptorKey {
    /// Resolution order. Release happens in reverse.
    pub const ALL: [DescriptorKey; 12] = [
        Self::DispatcherClass,
        Self::DispatcherInstance,
        Self::DispatchMethod,
        Self::InputEventClass,
        Self::InputEventWhenField,
        Self::InputEventModifiersField,
        Self::KeyEventClass,
        Self::KeyEventConstructor,
        Self::MouseEventClass,
        Self::MouseEventConstructor,
        Self::MouseWheelEventClass,
        Self::MouseWheelEventConstructor,
    ];

    pub const COUNT: usize = Self::ALL.len();

    fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::DispatcherClass => "dispatcher class",
            Self::DispatcherInstance => "dispatcher instance",
            Self::DispatchMethod => "dispatch method",
            Self::InputEventClass => "event class",
            Self::InputEventWhenField => "timestamp field",
            Self::InputEventModifiersField => "modifier field",
            Self::KeyEventClass => "key event class",
            Self::KeyEventConstructor => "key event constructor",
            Self::MouseEventClass => "mouse event class",
            Self::MouseEventConstructor => "mouse event constructor",
            Self::MouseWheelEventClass => "mouse wheel event class",
            Self::MouseWheelEventConstructor => "mouse wheel event constructor",
        }
    }

    /// What the runtime is asked to resolve for this key.
    pub fn spec(self) -> DescriptorSpec {
        use DescriptorKind::*;
        let (kind, owner, name, signature) = match self {
            Self::DispatcherClass => (Class, DISPATCHER, "", ""),
            Self::DispatcherInstance => (Instance, DISPATCHER, "getInstance", "()LGlobalScreen;"),
            Self::DispatchMethod => (Method, DISPATCHER, "dispatchEvent", "(LNativeInputEvent;)V"),
            Self::InputEventClass => (Class, INPUT_EVENT, "", ""),
            Self::InputEventWhenField => (Field, INPUT_EVENT, "when", "J"),
            Self::InputEventModifiersField => (Field, INPUT_EVENT, "modifiers", "I"),
            Self::KeyEventClass => (Class, KEY_EVENT, "", ""),
            Self::KeyEventConstructor => (Method, KEY_EVENT, "<init>", "(IJIIIC)V"),
            Self::MouseEventClass => (Class, MOUSE_EVENT, "", ""),
            Self::MouseEventConstructor => (Method, MOUSE_EVENT, "<init>", "(IJIIIII)V"),
            Self::MouseWheelEventClass => (Class, WHEEL_EVENT, "", ""),
            Self::MouseWheelEventConstructor => (Method, WHEEL_EVENT, "<init>", "(IJIIIIIII)V"),
        };
        DescriptorSpec {
            kind,
            owner,
            name,
            signature,
        }
    }
}

impl fmt::Display for DescriptorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Immutable, fully resolved set of descriptors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescriptorTable {
    slots: [Descriptor; DescriptorKey::COUNT],
}

impl DescriptorTable {
    pub fn get(&self, key: DescriptorKey) -> Descriptor {
        self.slots[key.index()]
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = (DescriptorKey, Descriptor)> + '_ {
        DescriptorKey::ALL.iter().map(|&key| (key, self.get(key)))
    }

    pub fn dispatch_target(&self) -> DispatchTarget {
        DispatchTarget {
            instance: self.get(DescriptorKey::DispatcherInstance),
            method: self.get(DescriptorKey::DispatchMethod),
        }
    }
}

/// Outcome of [`GlobalResourceRegistry::destroy`].
#[derive(Debug, Default)]
pub struct RegistryTeardown {
    pub released: usize,
    pub failures: Vec<SoftTeardownFailure>,
}

/// Lifecycle-scoped owner of the descriptor table.
///
/// Only the lifecycle controller mutates it, and only while no dispatch
/// callback is registered with the engine.
#[derive(Debug, Default)]
pub struct GlobalResourceRegistry {
    table: RwLock<Option<Arc<DescriptorTable>>>,
}

impl GlobalResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve every key. On the first failure every descriptor resolved so
    /// far is released again and the registry stays empty.
    pub fn populate(&self, env: &dyn Environment) -> Result<(), FatalInit> {
        let mut resolved: Vec<Descriptor> = Vec::with_capacity(DescriptorKey::COUNT);
        for key in DescriptorKey::ALL {
            match env.resolve(&key.spec()) {
                Ok(descriptor) => {
                    tracing::trace!(%key, %descriptor, "resolved");
                    resolved.push(descriptor);
                }
                Err(source) => {
                    tracing::error!("failed to resolve {key} ({}): {source}", key.spec());
                    release_all(env, DescriptorKey::ALL.iter().copied().zip(resolved));
                    return Err(FatalInit::Registry { key, source });
                }
            }
        }

        let table = Arc::new(DescriptorTable {
            slots: std::array::from_fn(|i| resolved[i]),
        });
        if let Some(stale) = self.table.write().replace(table) {
            tracing::warn!("registry populated twice, releasing the previous table");
            release_all(env, stale.iter());
        }
        tracing::debug!("global resource registry populated");
        Ok(())
    }

    /// Release every cached descriptor. Without an environment the table is
    /// dropped locally and the runtime-side handles are left to the runtime.
    /// Calling this on an empty registry is a no-op.
    pub fn destroy(&self, env: Option<&dyn Environment>) -> RegistryTeardown {
        let mut teardown = RegistryTeardown::default();
        let Some(table) = self.table.write().take() else {
            return teardown;
        };

        let Some(env) = env else {
            let failure = SoftTeardownFailure::ReleasedLocally {
                count: DescriptorKey::COUNT,
            };
            tracing::warn!("{failure}");
            teardown.failures.push(failure);
            return teardown;
        };

        teardown.failures = release_all(env, table.iter());
        teardown.released = DescriptorKey::COUNT - teardown.failures.len();
        tracing::debug!(released = teardown.released, "global resource registry destroyed");
        teardown
    }

    /// O(1) lookup. Fails fast with [`RegistryError::Unpopulated`] before
    /// `populate` and after `destroy`; never returns a stale handle.
    pub fn get(&self, key: DescriptorKey) -> Result<Descriptor, RegistryError> {
        self.table
            .read()
            .as_ref()
            .map(|table| table.get(key))
            .ok_or(RegistryError::Unpopulated)
    }

    /// Consistent view of the whole table.
    pub fn snapshot(&self) -> Result<Arc<DescriptorTable>, RegistryError> {
        self.table.read().clone().ok_or(RegistryError::Unpopulated)
    }

    pub fn is_populated(&self) -> bool {
        self.table.read().is_some()
    }
}

fn release_all(
    env: &dyn Environment,
    descriptors: impl DoubleEndedIterator<Item = (DescriptorKey, Descriptor)>,
) -> Vec<SoftTeardownFailure> {
    let mut failures = Vec::new();
    for (key, descriptor) in descriptors.rev() {
        if let Err(source) = env.release(descriptor) {
            tracing::warn!("failed to release {key} ({descriptor}): {source}");
            failures.push(SoftTeardownFailure::Release { key, source });
        }
    }
    failures
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::memory::MemoryRuntime;
    use crate::runtime::{InterfaceVersion, ManagedRuntime};

    #[test]
    fn test_keys_are_indexed_in_order() {
        for (i, key) in DescriptorKey::ALL.iter().enumerate() {
            assert_eq!(key.index(), i);
        }
    }

    #[test]
    fn test_specs_are_distinct() {
        let specs: Vec<_> = DescriptorKey::ALL.iter().map(|k| k.spec()).collect();
        for (i, a) in specs.iter().enumerate() {
            for b in &specs[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn test_populate_get_destroy() {
        let runtime = MemoryRuntime::new();
        let env = runtime.env(InterfaceVersion::V1_4).unwrap();
        let registry = GlobalResourceRegistry::new();

        assert_eq!(registry.get(DescriptorKey::KeyEventClass), Err(RegistryError::Unpopulated));

        registry.populate(env.as_ref()).unwrap();
        assert!(registry.is_populated());
        assert_eq!(runtime.live_descriptors(), DescriptorKey::COUNT);
        let class = registry.get(DescriptorKey::KeyEventClass).unwrap();
        assert_eq!(registry.snapshot().unwrap().get(DescriptorKey::KeyEventClass), class);

        let teardown = registry.destroy(Some(env.as_ref()));
        assert_eq!(teardown.released, DescriptorKey::COUNT);
        assert!(teardown.failures.is_empty());
        assert_eq!(runtime.live_descriptors(), 0);
        assert_eq!(registry.get(DescriptorKey::KeyEventClass), Err(RegistryError::Unpopulated));
    }

    #[test]
    fn test_failed_key_rolls_back() {
        let runtime = MemoryRuntime::new();
        let env = runtime.env(InterfaceVersion::V1_4).unwrap();
        runtime.fail_resolution(DescriptorKey::MouseEventConstructor.spec());

        let registry = GlobalResourceRegistry::new();
        let err = registry.populate(env.as_ref()).unwrap_err();
        assert!(matches!(
            err,
            FatalInit::Registry { key: DescriptorKey::MouseEventConstructor, .. }
        ));
        assert!(!registry.is_populated());
        assert_eq!(runtime.live_descriptors(), 0);
    }

    #[test]
    fn test_double_destroy() {
        let runtime = MemoryRuntime::new();
        let env = runtime.env(InterfaceVersion::V1_4).unwrap();
        let registry = GlobalResourceRegistry::new();
        registry.populate(env.as_ref()).unwrap();

        registry.destroy(Some(env.as_ref()));
        let second = registry.destroy(Some(env.as_ref()));
        assert_eq!(second.released, 0);
        assert!(second.failures.is_empty());
    }

    #[test]
    fn test_destroy_without_environment() {
        let runtime = MemoryRuntime::new();
        let env = runtime.env(InterfaceVersion::V1_4).unwrap();
        let registry = GlobalResourceRegistry::new();
        registry.populate(env.as_ref()).unwrap();

        let teardown = registry.destroy(None);
        assert_eq!(teardown.released, 0);
        assert_eq!(
            teardown.failures,
            vec![SoftTeardownFailure::ReleasedLocally { count: DescriptorKey::COUNT }]
        );
        assert!(registry.snapshot().is_err());
    }
}
