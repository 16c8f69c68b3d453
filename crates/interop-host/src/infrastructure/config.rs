//! TOML configuration for the host process.
//!
//! ```toml
//! log_level = "info"
//!
//! [ipc]
//! channel_name = "HostChannel"   # omit for a random name
//! access = "current-user"        # all-local-users | authenticated-users | current-user
//!
//! [callbacks]
//! connect_timeout_ms = 2000
//! call_timeout_ms = 5000
//! ```
//!
//! Every field has a default, so a missing or partial file works.

use std::path::{Path, PathBuf};
use std::time::Duration;

use interop_ipc::{AccessRule, ProxyOptions, ServerOptions};
use serde::{Deserialize, Serialize};
use thiserror::Error;

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
pub struct HostConfig {
    /// `tracing` filter used when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub ipc: IpcConfig,
    #[serde(default)]
    pub callbacks: CallbackConfig,
}

/// Where the host service is published.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct IpcConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port_name: Option<String>,
    #[serde(default)]
    pub access: AccessRule,
}

/// Timeouts for calls into plugin callback channels.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CallbackConfig {
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default = "default_call_timeout_ms")]
    pub call_timeout_ms: u64,
}

fn default_log_level() -> String {
    "info".to_string()
}
fn default_connect_timeout_ms() -> u64 {
    2000
}
fn default_call_timeout_ms() -> u64 {
    5000
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            ipc: IpcConfig::default(),
            callbacks: CallbackConfig::default(),
        }
    }
}

impl Default for CallbackConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: default_connect_timeout_ms(),
            call_timeout_ms: default_call_timeout_ms(),
        }
    }
}

impl IpcConfig {
    pub fn server_options(&self) -> ServerOptions {
        ServerOptions {
            channel_name: self.channel_name.clone(),
            port_name: self.port_name.clone(),
            access: self.access,
        }
    }
}

impl CallbackConfig {
    pub fn proxy_options(&self) -> ProxyOptions {
        ProxyOptions {
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            call_timeout: Duration::from_millis(self.call_timeout_ms),
        }
    }
}

/// Loads the host configuration from `path`, returning defaults if the file
/// does not exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config(path: &Path) -> Result<HostConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(toml::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HostConfig::default()),
        Err(source) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}
