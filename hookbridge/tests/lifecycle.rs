//! Load/unload tests against the in-memory runtime and the synthetic engine.
//!
//! Tests cover:
//! - Repeated load/unload cycles leave no descriptors, properties or registrations behind
//! - A resolution failure on any single registry key aborts the load with no dispatch installed
//! - Unload on a thread without an environment stays quiet and still drops local state
//! - Registry lookups after unload fail fast instead of returning stale handles

use std::sync::Arc;

use hookbridge::engine::synthetic::SyntheticEngine;
use hookbridge::error::{RegistryError, RuntimeError};
use hookbridge::event::{EventType, MouseData, RawEvent};
use hookbridge::properties::NativeProperties;
use hookbridge::registry::DescriptorKey;
use hookbridge::runtime::memory::MemoryRuntime;
use hookbridge::{Bridge, BridgeConfig, FatalInit, SoftTeardownFailure};

fn all_properties() -> NativeProperties {
    NativeProperties {
        auto_repeat_rate: Some(30),
        auto_repeat_delay: Some(500),
        multi_click_interval: Some(200),
        pointer_sensitivity: Some(10),
        pointer_acceleration_multiplier: Some(2),
        pointer_acceleration_threshold: Some(4),
    }
}

fn setup() -> (MemoryRuntime, SyntheticEngine, Bridge) {
    let runtime = MemoryRuntime::new();
    let engine = SyntheticEngine::new().with_properties(all_properties());
    let bridge = Bridge::new(Arc::new(engine.clone()), BridgeConfig::default());
    (runtime, engine, bridge)
}

#[test]
fn repeated_cycles_leave_no_residue() {
    let (runtime, engine, bridge) = setup();

    for cycle in 0..5 {
        bridge.on_load(Arc::new(runtime.clone())).unwrap();
        assert_eq!(runtime.live_descriptors(), DescriptorKey::COUNT, "cycle {cycle}");
        assert_eq!(runtime.property_count(), 6, "cycle {cycle}");

        let report = bridge.on_unload(&runtime);
        assert!(report.warnings.is_empty(), "cycle {cycle}: {:?}", report.warnings);
        assert_eq!(runtime.live_descriptors(), 0, "cycle {cycle}");
        assert_eq!(runtime.property_count(), 0, "cycle {cycle}");
        assert!(!engine.is_dispatch_registered());
        assert!(!engine.is_logger_registered());
    }

    assert_eq!(engine.dispatch_registrations(), 5);
    assert!(runtime.fatal_signals().is_empty());
}

#[test]
fn zero_cycles_is_clean() {
    let (runtime, engine, bridge) = setup();
    let report = bridge.on_unload(&runtime);
    assert!(!report.was_loaded);
    assert_eq!(engine.dispatch_registrations(), 0);
    assert_eq!(runtime.live_descriptors(), 0);
}

#[test]
fn any_failed_key_prevents_dispatch_registration() {
    for key in DescriptorKey::ALL {
        let (runtime, engine, bridge) = setup();
        runtime.fail_resolution(key.spec());

        let err = bridge.on_load(Arc::new(runtime.clone())).unwrap_err();
        assert_eq!(
            err,
            FatalInit::Registry {
                key,
                source: RuntimeError::Unresolved(key.spec().to_string()),
            }
        );
        assert_eq!(engine.dispatch_registrations(), 0, "{key}");
        assert_eq!(engine.logger_registrations(), 0, "{key}");
        assert_eq!(runtime.live_descriptors(), 0, "{key}");
        assert_eq!(runtime.property_count(), 0, "{key}");
        assert_eq!(runtime.fatal_signals(), vec![err.to_string()], "{key}");
        assert!(!bridge.is_loaded());
    }
}

#[test]
fn load_after_failed_load_succeeds() {
    let (runtime, engine, bridge) = setup();
    runtime.fail_resolution(DescriptorKey::DispatchMethod.spec());
    assert!(bridge.on_load(Arc::new(runtime.clone())).is_err());

    let fresh = MemoryRuntime::new();
    bridge.on_load(Arc::new(fresh.clone())).unwrap();
    assert!(engine.is_dispatch_registered());
    bridge.on_unload(&fresh);
    assert_eq!(fresh.live_descriptors(), 0);
}

#[test]
fn unload_without_environment_is_soft() {
    let (runtime, engine, bridge) = setup();
    bridge.on_load(Arc::new(runtime.clone())).unwrap();
    let registry = bridge.registry().unwrap();

    runtime.refuse_env(true);
    let report = bridge.on_unload(&runtime);

    assert!(report.was_loaded);
    assert_eq!(report.properties_cleared, 0);
    assert_eq!(report.descriptors_released, 0);
    assert_eq!(
        report.warnings,
        vec![
            SoftTeardownFailure::NoEnvironment(RuntimeError::Detached),
            SoftTeardownFailure::ReleasedLocally { count: DescriptorKey::COUNT },
        ]
    );
    // Local state is gone even though the runtime kept its side.
    assert!(!bridge.is_loaded());
    assert!(!registry.is_populated());
    assert!(!engine.is_dispatch_registered());
    assert!(!engine.is_logger_registered());
    assert!(runtime.fatal_signals().is_empty());

    // The next cycle starts from scratch.
    runtime.refuse_env(false);
    bridge.on_load(Arc::new(runtime.clone())).unwrap();
    bridge.on_unload(&runtime);
}

#[test]
fn unload_after_runtime_destroyed_is_soft() {
    let (runtime, _engine, bridge) = setup();
    bridge.on_load(Arc::new(runtime.clone())).unwrap();
    runtime.invalidate();

    let report = bridge.on_unload(&runtime);
    assert_eq!(
        report.warnings.first(),
        Some(&SoftTeardownFailure::NoEnvironment(RuntimeError::Destroyed))
    );
    assert!(!bridge.is_loaded());
}

#[test]
fn unload_reports_property_clear_failures() {
    let (runtime, _engine, bridge) = setup();
    bridge.on_load(Arc::new(runtime.clone())).unwrap();
    runtime.make_read_only("nativehook.key.repeat.rate");

    let report = bridge.on_unload(&runtime);
    assert_eq!(report.properties_cleared, 5);
    assert_eq!(report.descriptors_released, DescriptorKey::COUNT);
    assert!(matches!(
        report.warnings.as_slice(),
        [SoftTeardownFailure::ClearProperty { name, .. }] if name == "nativehook.key.repeat.rate"
    ));
}

#[test]
fn lookups_after_unload_fail_fast() {
    let (runtime, engine, bridge) = setup();
    bridge.on_load(Arc::new(runtime.clone())).unwrap();
    let registry = bridge.registry().unwrap();
    let class = registry.get(DescriptorKey::MouseEventClass).unwrap();
    assert!(runtime.is_live(class));

    bridge.on_unload(&runtime);

    for key in DescriptorKey::ALL {
        assert_eq!(registry.get(key), Err(RegistryError::Unpopulated));
    }
    assert!(registry.snapshot().is_err());
    assert!(!runtime.is_live(class));
    assert!(bridge.registry().is_none());

    // The engine no longer reaches the bridge at all.
    let press = RawEvent::mouse(EventType::MousePressed, 0, 0, MouseData::default());
    assert_eq!(engine.emit(vec![press]), 0);
    assert!(runtime.dispatched().is_empty());
}
