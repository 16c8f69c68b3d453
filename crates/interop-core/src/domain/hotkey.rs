//! The hotkey value type and its registration scope.
//!
//! A [`HotKey`] is an immutable pair of a Windows Virtual Key code and a set
//! of modifier bits. Two hotkeys with the same code and modifiers are equal
//! and hash identically, which is what lets the hook engine build a fresh
//! `HotKey` for every key-down event and use it directly as a registry key.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::keymap::{vk_from_name, vk_name};

/// Errors returned when parsing a hotkey string such as `"Ctrl+Alt+K"`.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HotKeyParseError {
    #[error("hotkey string is empty")]
    Empty,
    #[error("unknown modifier: {0}")]
    UnknownModifier(String),
    #[error("unknown key: {0}")]
    UnknownKey(String),
}

/// Modifier keys held while a hotkey's primary key goes down.
///
/// Left and right variants are not distinguished: the hook samples the
/// combined state of each modifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct KeyModifiers(pub u8);

impl KeyModifiers {
    pub const CTRL: u8 = 1 << 0;
    pub const ALT: u8 = 1 << 1;
    pub const SHIFT: u8 = 1 << 2;
    pub const META: u8 = 1 << 3;

    /// No modifier held.
    pub const fn none() -> Self {
        Self(0)
    }

    /// Builds the modifier set from the four individual key states.
    pub fn from_flags(ctrl: bool, alt: bool, shift: bool, meta: bool) -> Self {
        let mut bits = 0u8;
        if ctrl {
            bits |= Self::CTRL;
        }
        if alt {
            bits |= Self::ALT;
        }
        if shift {
            bits |= Self::SHIFT;
        }
        if meta {
            bits |= Self::META;
        }
        Self(bits)
    }

    pub fn ctrl(&self) -> bool {
        self.0 & Self::CTRL != 0
    }

    pub fn alt(&self) -> bool {
        self.0 & Self::ALT != 0
    }

    pub fn shift(&self) -> bool {
        self.0 & Self::SHIFT != 0
    }

    /// Returns `true` if either Windows (Meta/Super) key is held.
    pub fn meta(&self) -> bool {
        self.0 & Self::META != 0
    }

    /// Returns `true` when no modifier is held.
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }
}

/// An immutable key combination: a Virtual Key code plus modifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HotKey {
    /// Windows Virtual Key code of the primary key.
    pub code: u8,
    /// Modifier keys that must be held.
    pub modifiers: KeyModifiers,
}

impl HotKey {
    pub fn new(code: u8, modifiers: KeyModifiers) -> Self {
        Self { code, modifiers }
    }

    /// Convenience constructor mirroring the shape of a raw key event.
    pub fn with_flags(code: u8, ctrl: bool, alt: bool, shift: bool, meta: bool) -> Self {
        Self::new(code, KeyModifiers::from_flags(ctrl, alt, shift, meta))
    }

    /// Parses strings such as `"Ctrl+Shift+F5"` or `"alt + k"`.
    ///
    /// The last `+`-separated part is the key; every part before it must be a
    /// modifier (`ctrl`/`control`, `alt`, `shift`, `win`/`meta`/`super`).
    ///
    /// # Errors
    ///
    /// Returns [`HotKeyParseError`] for empty input, unknown modifiers or an
    /// unknown key name.
    pub fn parse(s: &str) -> Result<Self, HotKeyParseError> {
        let parts: Vec<&str> = s.split('+').map(str::trim).collect();
        let (key_part, modifier_parts) = match parts.split_last() {
            Some((key, mods)) if !key.is_empty() => (*key, mods),
            _ => return Err(HotKeyParseError::Empty),
        };

        let mut bits = 0u8;
        for part in modifier_parts {
            bits |= match part.to_ascii_lowercase().as_str() {
                "ctrl" | "control" => KeyModifiers::CTRL,
                "alt" => KeyModifiers::ALT,
                "shift" => KeyModifiers::SHIFT,
                "win" | "meta" | "super" => KeyModifiers::META,
                _ => return Err(HotKeyParseError::UnknownModifier((*part).to_string())),
            };
        }

        let code = vk_from_name(key_part)
            .ok_or_else(|| HotKeyParseError::UnknownKey(key_part.to_string()))?;
        Ok(Self::new(code, KeyModifiers(bits)))
    }
}

impl fmt::Display for HotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.modifiers.ctrl() {
            f.write_str("Ctrl+")?;
        }
        if self.modifiers.alt() {
            f.write_str("Alt+")?;
        }
        if self.modifiers.shift() {
            f.write_str("Shift+")?;
        }
        if self.modifiers.meta() {
            f.write_str("Win+")?;
        }
        match vk_name(self.code) {
            Some(name) => f.write_str(&name),
            None => write!(f, "VK_{:02X}", self.code),
        }
    }
}

impl FromStr for HotKey {
    type Err = HotKeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Where a registered hotkey is allowed to fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HotKeyScope {
    /// Only while the tracked host window (e.g. the element editor) is in front.
    Window,
    /// Only while any window owned by the host process is in front.
    #[default]
    Process,
    /// Anywhere on the desktop. Use with care: the keystroke is swallowed system-wide.
    Global,
}

impl fmt::Display for HotKeyScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HotKeyScope::Window => "window",
            HotKeyScope::Process => "process",
            HotKeyScope::Global => "global",
        };
        f.write_str(name)
    }
}
