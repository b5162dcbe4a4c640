//! Drives a full load → dispatch → unload cycle against the in-memory runtime
//! and a synthetic engine, then prints delivery statistics as JSON.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;

use hookbridge::engine::synthetic::SyntheticEngine;
use hookbridge::event::{EventType, KeyboardData, MouseData, RawEvent, WheelData};
use hookbridge::logging::{self, LogLevel};
use hookbridge::properties::NativeProperties;
use hookbridge::runtime::memory::MemoryRuntime;
use hookbridge::{Bridge, BridgeConfig};

#[derive(Debug, Parser)]
#[command(name = "hookbridge-sim", about = "Exercise the native hook bridge without a real engine")]
struct Args {
    /// Events emitted per engine thread.
    #[arg(long, default_value_t = 1000)]
    events: usize,
    /// Concurrent engine threads.
    #[arg(long, default_value_t = 4)]
    threads: usize,
    /// JSON bridge configuration file. Falls back to HOOKBRIDGE_CONFIG.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Emit JSON log lines.
    #[arg(long, env = "HOOKBRIDGE_LOG_JSON")]
    json_logs: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let mut config = match &args.config {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            BridgeConfig::from_json(&json)?
        }
        None => BridgeConfig::from_env()?,
    };
    config.json_logs |= args.json_logs;
    logging::init(&config);

    let runtime = MemoryRuntime::new();
    let engine = SyntheticEngine::new().with_properties(NativeProperties {
        auto_repeat_rate: Some(30),
        auto_repeat_delay: Some(500),
        multi_click_interval: Some(200),
        pointer_sensitivity: None,
        pointer_acceleration_multiplier: Some(2),
        pointer_acceleration_threshold: Some(4),
    });
    let bridge = Bridge::new(Arc::new(engine.clone()), config);

    let version = bridge
        .on_load(Arc::new(runtime.clone()))
        .context("bridge failed to load")?;
    tracing::info!(%version, "bridge loaded");
    engine.log(LogLevel::Info, "synthetic hook running");

    let started = chrono::Utc::now();
    let delivered = engine.emit_concurrently(args.threads, script(args.events));
    let elapsed = chrono::Utc::now() - started;

    let report = bridge.on_unload(&runtime);
    for warning in &report.warnings {
        tracing::warn!("{warning}");
    }

    let summary = serde_json::json!({
        "interface_version": version.to_string(),
        "engine_threads": args.threads,
        "delivered": delivered,
        "dispatched": report.stats.dispatched,
        "skipped": report.stats.skipped,
        "dropped": report.stats.dropped,
        "attached_threads": runtime.daemon_threads(),
        "descriptors_released": report.descriptors_released,
        "properties_cleared": report.properties_cleared,
        "leaked_descriptors": runtime.live_descriptors(),
        "elapsed_ms": elapsed.num_milliseconds(),
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

/// A repeating mix of every event family, bracketed by hook lifecycle events.
fn script(count: usize) -> Vec<RawEvent> {
    let base = chrono::Utc::now().timestamp_millis().max(0) as u64;
    let mut events = Vec::with_capacity(count + 2);
    events.push(RawEvent::hook(EventType::HookEnabled, base));
    for i in 0..count {
        let when = base + i as u64;
        let n = (i % 500) as i16;
        let event = match i % 4 {
            0 => RawEvent::keyboard(
                EventType::KeyPressed,
                when,
                0,
                KeyboardData { keycode: 0x1e, rawcode: 0x41, keychar: 0 },
            ),
            1 => RawEvent::keyboard(
                EventType::KeyTyped,
                when,
                0,
                KeyboardData { keycode: 0, rawcode: 0x41, keychar: 'a' as u16 },
            ),
            2 => RawEvent::mouse(
                EventType::MouseMoved,
                when,
                0,
                MouseData { button: 0, clicks: 0, x: n, y: n / 2 },
            ),
            _ => RawEvent::wheel(
                when,
                0,
                WheelData { clicks: 1, x: n, y: n, kind: 1, amount: 3, rotation: -1 },
            ),
        };
        events.push(event);
    }
    events.push(RawEvent::hook(EventType::HookDisabled, base + count as u64));
    events
}
