//! Logging sink for native messages and subscriber setup.

use tracing_subscriber::EnvFilter;

use crate::config::BridgeConfig;

/// Environment variable read for the filter directive.
pub const LOG_ENV: &str = "HOOKBRIDGE_LOG";

/// Severity levels as numbered by the native engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u32)]
pub enum LogLevel {
    Debug = 1,
    Info = 2,
    Warn = 3,
    Error = 4,
}

impl LogLevel {
    pub fn from_raw(level: u32) -> Option<Self> {
        match level {
            1 => Some(Self::Debug),
            2 => Some(Self::Info),
            3 => Some(Self::Warn),
            4 => Some(Self::Error),
            _ => None,
        }
    }
}

/// Forwards engine log lines into `tracing` under the `hookbridge::native`
/// target.
#[derive(Debug, Clone, Copy)]
pub struct LogSink {
    quiet: bool,
}

impl LogSink {
    pub fn new(quiet: bool) -> Self {
        Self {
            quiet: quiet || cfg!(feature = "quiet"),
        }
    }

    /// Returns whether the line was emitted.
    pub fn emit(&self, level: LogLevel, message: &str) -> bool {
        if self.quiet {
            return false;
        }
        let message = message.trim_end();
        match level {
            LogLevel::Debug => tracing::debug!(target: "hookbridge::native", "{message}"),
            LogLevel::Info => tracing::info!(target: "hookbridge::native", "{message}"),
            LogLevel::Warn => tracing::warn!(target: "hookbridge::native", "{message}"),
            LogLevel::Error => tracing::error!(target: "hookbridge::native", "{message}"),
        }
        true
    }
}

/// Install a global fmt subscriber. Returns `false` when the host already
/// installed one; that is not an error for an embedded module.
pub fn init(config: &BridgeConfig) -> bool {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| EnvFilter::new(&config.log_filter));
    if config.json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .try_init()
            .is_ok()
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .try_init()
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_mapping() {
        assert_eq!(LogLevel::from_raw(3), Some(LogLevel::Warn));
        assert_eq!(LogLevel::from_raw(0), None);
        assert_eq!(LogLevel::from_raw(5), None);
        assert!(LogLevel::Error > LogLevel::Debug);
    }

    #[test]
    fn test_quiet_sink_drops_everything() {
        let sink = LogSink::new(true);
        assert!(!sink.emit(LogLevel::Error, "boom"));
    }

    #[test]
    fn test_sink_emits() {
        let sink = LogSink::new(false);
        assert_eq!(sink.emit(LogLevel::Info, "hook started\n"), !cfg!(feature = "quiet"));
    }

    #[test]
    fn test_init_twice_is_harmless() {
        let config = BridgeConfig::default();
        let _ = init(&config);
        assert!(!init(&config));
    }
}
