//! # interop-plugin
//!
//! The plugin half of the interop layer.
//!
//! A [`PluginSession`] connects to the host's channel, publishes a callback
//! channel of its own, and subscribes to host lifecycle events. Those events
//! keep a shared [`interop_hook::HostContext`] current, which is what the
//! keyboard hook's scope checks read. [`HotKeyBindings`] maps named plugin
//! actions onto hotkeys, with per-action overrides from configuration.
//!
//! - **`application`** – Session, callback service, host locator, and hotkey
//!   bindings.
//! - **`infrastructure`** – TOML configuration.

pub mod application;
pub mod infrastructure;

pub use application::hotkeys::{BindingError, HotKeyBindings};
pub use application::session::{
    HostInfoLocator, PluginCallbackService, PluginSession, SessionError, SessionOptions,
};
pub use infrastructure::config::{load_config, ConfigError, PluginConfig};
