//! # interop-host
//!
//! The host half of the interop layer. It publishes [`HostService`] on a
//! named channel so plugins can ping it, ask for its main window, and
//! subscribe to lifecycle events, which are then pushed to each plugin's
//! callback channel.
//!
//! - **`application`** – The host service and the remote subscriber that
//!   forwards events to a plugin.
//! - **`infrastructure`** – TOML configuration.

pub mod application;
pub mod infrastructure;

pub use application::host_service::{HostService, RemoteSubscriber};
pub use infrastructure::config::{load_config, CallbackConfig, ConfigError, HostConfig, IpcConfig};
