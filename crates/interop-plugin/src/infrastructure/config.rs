//! TOML configuration for a plugin process.
//!
//! ```toml
//! log_level = "info"
//!
//! [ipc]
//! connect_timeout_ms = 2000
//! call_timeout_ms = 10000
//! access = "current-user"
//!
//! [hook]
//! shutdown_timeout_ms = 1500
//! refresh_interval_ms = 1000
//!
//! [hotkeys]
//! ping_host = "Ctrl+Alt+P"
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use interop_hook::EngineOptions;
use interop_ipc::{AccessRule, ProxyOptions};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::application::session::SessionOptions;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PluginConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub ipc: IpcConfig,
    #[serde(default)]
    pub hook: HookConfig,
    /// Action name to hotkey text, overriding the plugin's defaults.
    #[serde(default)]
    pub hotkeys: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IpcConfig {
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default = "default_call_timeout_ms")]
    pub call_timeout_ms: u64,
    /// Who may call the plugin's callback channel.
    #[serde(default)]
    pub access: AccessRule,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HookConfig {
    #[serde(default = "default_shutdown_timeout_ms")]
    pub shutdown_timeout_ms: u64,
    /// Minimum spacing between host window lookups while the window is unknown.
    #[serde(default = "default_refresh_interval_ms")]
    pub refresh_interval_ms: u64,
}

fn default_log_level() -> String {
    "info".to_string()
}
fn default_connect_timeout_ms() -> u64 {
    2000
}
fn default_call_timeout_ms() -> u64 {
    10_000
}
fn default_shutdown_timeout_ms() -> u64 {
    1500
}
fn default_refresh_interval_ms() -> u64 {
    1000
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            ipc: IpcConfig::default(),
            hook: HookConfig::default(),
            hotkeys: BTreeMap::new(),
        }
    }
}

impl Default for IpcConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: default_connect_timeout_ms(),
            call_timeout_ms: default_call_timeout_ms(),
            access: AccessRule::default(),
        }
    }
}

impl Default for HookConfig {
    fn default() -> Self {
        Self {
            shutdown_timeout_ms: default_shutdown_timeout_ms(),
            refresh_interval_ms: default_refresh_interval_ms(),
        }
    }
}

impl PluginConfig {
    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            proxy: ProxyOptions {
                connect_timeout: Duration::from_millis(self.ipc.connect_timeout_ms),
                call_timeout: Duration::from_millis(self.ipc.call_timeout_ms),
            },
            callback_access: self.ipc.access,
        }
    }

    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            shutdown_timeout: Duration::from_millis(self.hook.shutdown_timeout_ms),
        }
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.hook.refresh_interval_ms)
    }
}

/// Loads the plugin configuration from `path`, returning defaults if the
/// file does not exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config(path: &Path) -> Result<PluginConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(toml::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(PluginConfig::default()),
        Err(source) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_values() {
        let cfg = PluginConfig::default();

        assert_eq!(cfg.session_options().proxy, ProxyOptions::default());
        assert_eq!(cfg.engine_options().shutdown_timeout, Duration::from_millis(1500));
        assert_eq!(cfg.refresh_interval(), Duration::from_secs(1));
        assert!(cfg.hotkeys.is_empty());
    }

    #[test]
    fn test_hotkey_overrides_and_partial_sections_parse() {
        // Arrange
        let text = r#"
            log_level = "debug"

            [hook]
            refresh_interval_ms = 250

            [hotkeys]
            ping_host = "Ctrl+Alt+P"
            show_window = "Shift+F5"
        "#;

        // Act
        let cfg: PluginConfig = toml::from_str(text).expect("parse");

        // Assert
        assert_eq!(cfg.log_level, "debug");
        assert_eq!(cfg.refresh_interval(), Duration::from_millis(250));
        assert_eq!(cfg.hook.shutdown_timeout_ms, 1500);
        assert_eq!(cfg.hotkeys.get("show_window").map(String::as_str), Some("Shift+F5"));
        assert_eq!(cfg.ipc.access, AccessRule::AllLocalUsers);
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let file = format!("interop-plugin-{}.toml", uuid::Uuid::new_v4());
        let path = std::env::temp_dir().join(file);
        assert_eq!(load_config(&path).expect("defaults"), PluginConfig::default());
    }
}
