//! # interop-core
//!
//! Shared library for the host/plugin interop layer. It holds the value
//! types both processes agree on, the binary wire codec used on the IPC
//! channel, and the generator for channel names.
//!
//! This crate has no dependency on OS APIs, sockets or threads; the IPC
//! transport lives in `interop-ipc` and the keyboard hook in `interop-hook`.
//!
//! # Architecture overview
//!
//! A running desktop application (the "host") publishes a service object on
//! a named, access-controlled channel. Plugin processes connect to that
//! channel, call the host, and publish a callback channel of their own so the
//! host can notify them of lifecycle events. Plugins also install a global
//! keyboard hook and bind hotkeys that fire only while the host is in front.
//!
//! - **`domain`** – Hotkeys, hotkey scopes, and the host window/event types.
//! - **`keymap`** – Windows Virtual Key names used to parse and print hotkeys.
//! - **`protocol`** – Frame header codec, bincode payload helpers, and the
//!   cryptographically random channel name generator.
//! - **`contract`** – The [`Contract`] trait binding a request type to a
//!   response type, plus the two contracts spoken between host and plugin.

pub mod contract;
pub mod domain;
pub mod keymap;
pub mod protocol;

pub use contract::{
    Contract, HostContract, HostRequest, HostResponse, PluginCallbackContract,
    PluginCallbackRequest, PluginCallbackResponse,
};
pub use domain::host::{HostEvent, HostEventKind, HostWindow, SubscriptionId};
pub use domain::hotkey::{HotKey, HotKeyParseError, HotKeyScope, KeyModifiers};
pub use protocol::channel_name::generate_channel_name;
pub use protocol::codec::{decode_frame, encode_frame, ProtocolError};
pub use protocol::messages::{Frame, FrameKind};
