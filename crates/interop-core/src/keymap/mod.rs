//! Key naming tables.
//!
//! Hotkeys are stored and matched by Windows Virtual Key code because that is
//! what the low-level keyboard hook reports. The table in [`windows_vk`]
//! gives every bindable VK code a stable, human-readable name so hotkeys can
//! be written in configuration files (`"Ctrl+Shift+F5"`) and printed in logs.

pub mod windows_vk;

pub use windows_vk::{vk_from_name, vk_name};
