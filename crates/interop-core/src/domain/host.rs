//! Host application identity and lifecycle events.
//!
//! Plugins never locate or launch the host themselves. They learn about it
//! from [`HostEvent`]s pushed over the callback channel, and each event that
//! carries a [`HostWindow`] refreshes the plugin's notion of "the host".

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The host's main window handle and owning process id.
///
/// The handle is an opaque OS value (`HWND` on Windows) widened to `i64` so
/// that it survives serialization unchanged on every platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HostWindow {
    pub handle: i64,
    pub process_id: u32,
}

impl HostWindow {
    pub fn new(handle: i64, process_id: u32) -> Self {
        Self { handle, process_id }
    }
}

/// A lifecycle notification multicast from the host to subscribed plugins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum HostEvent {
    /// The host is starting; its window does not exist yet.
    Starting,
    /// The host finished starting and its main window is available.
    Started(HostWindow),
    /// The host has shut down. Restricted hotkeys must stop matching.
    Stopped,
    /// The tracked window was recreated or replaced.
    WindowChanged(HostWindow),
}

impl HostEvent {
    pub fn kind(&self) -> HostEventKind {
        match self {
            HostEvent::Starting => HostEventKind::Starting,
            HostEvent::Started(_) => HostEventKind::Started,
            HostEvent::Stopped => HostEventKind::Stopped,
            HostEvent::WindowChanged(_) => HostEventKind::WindowChanged,
        }
    }

    /// The window carried by the event, if any.
    pub fn window(&self) -> Option<HostWindow> {
        match self {
            HostEvent::Started(w) | HostEvent::WindowChanged(w) => Some(*w),
            HostEvent::Starting | HostEvent::Stopped => None,
        }
    }
}

/// Payload-free discriminant of [`HostEvent`], used when subscribing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HostEventKind {
    Starting,
    Started,
    Stopped,
    WindowChanged,
}

impl HostEventKind {
    pub const ALL: [HostEventKind; 4] = [
        HostEventKind::Starting,
        HostEventKind::Started,
        HostEventKind::Stopped,
        HostEventKind::WindowChanged,
    ];

    /// Event name used in log records.
    pub fn as_str(&self) -> &'static str {
        match self {
            HostEventKind::Starting => "host_starting",
            HostEventKind::Started => "host_started",
            HostEventKind::Stopped => "host_stopped",
            HostEventKind::WindowChanged => "host_window_changed",
        }
    }
}

impl fmt::Display for HostEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifies one plugin subscription held by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubscriptionId(pub Uuid);

impl SubscriptionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SubscriptionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
