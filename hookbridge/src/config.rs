//! Bridge configuration.

use serde::Deserialize;

use crate::error::ConfigError;
use crate::runtime::InterfaceVersion;

/// Environment variable holding a JSON [`BridgeConfig`].
pub const CONFIG_ENV: &str = "HOOKBRIDGE_CONFIG";
pub const QUIET_ENV: &str = "HOOKBRIDGE_QUIET";
pub const LOG_JSON_ENV: &str = "HOOKBRIDGE_LOG_JSON";

/// Settings fixed for the lifetime of one load cycle.
///
/// JSON schema (every field optional):
/// ```json
/// {
///   "interface_version": "1.4",
///   "property_prefix": "nativehook",
///   "quiet": false,
///   "json_logs": false,
///   "log_filter": "hookbridge=info"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Version requested from the runtime at load.
    pub interface_version: InterfaceVersion,
    /// Prefix of every mirrored native property.
    pub property_prefix: String,
    /// Suppress every line forwarded from the native engine.
    pub quiet: bool,
    pub json_logs: bool,
    /// Default filter directive when `HOOKBRIDGE_LOG` is unset.
    pub log_filter: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            interface_version: InterfaceVersion::V1_4,
            property_prefix: "nativehook".to_string(),
            quiet: cfg!(feature = "quiet"),
            json_logs: false,
            log_filter: "hookbridge=info".to_string(),
        }
    }
}

impl BridgeConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let mut config: Self = serde_json::from_str(json)?;
        config.quiet |= cfg!(feature = "quiet");
        Ok(config)
    }

    /// `HOOKBRIDGE_CONFIG` (JSON) overlaid with the `HOOKBRIDGE_QUIET` and
    /// `HOOKBRIDGE_LOG_JSON` switches.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = match std::env::var(CONFIG_ENV) {
            Ok(json) => Self::from_json(&json)?,
            Err(_) => Self::default(),
        };
        if env_flag(QUIET_ENV) {
            config.quiet = true;
        }
        if env_flag(LOG_JSON_ENV) {
            config.json_logs = true;
        }
        Ok(config)
    }
}

fn env_flag(name: &str) -> bool {
    std::env::var(name).unwrap_or_default() == "1"
}
