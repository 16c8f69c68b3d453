//! Operating system seams for the keyboard hook.
//!
//! On Windows, [`windows::WindowsHookInstaller`] installs a `WH_KEYBOARD_LL`
//! hook on a dedicated Win32 message-loop thread and
//! [`windows::WindowsDesktop`] reads the foreground window and live modifier
//! state.
//!
//! # Windows-Specific Constraint
//!
//! The hook callback must return within the system's
//! `LowLevelHooksTimeout` (a few hundred milliseconds) or Windows silently
//! removes the hook. Whatever a [`KeystrokeSink`] does must therefore be
//! bounded and non-blocking.
//!
//! # Testability
//!
//! [`mock::ManualHookInstaller`] and [`mock::MockDesktop`] let tests feed
//! synthetic keystrokes through exactly the same path without any OS hook.

use std::sync::Arc;

use interop_core::KeyModifiers;

pub mod mock;

#[cfg(target_os = "windows")]
pub mod windows;

// ── Raw hook messages ─────────────────────────────────────────────────────────

/// `nCode` value meaning the hook should process the message.
pub const HC_ACTION: i32 = 0;
pub const WM_KEYDOWN: u32 = 0x0100;
pub const WM_KEYUP: u32 = 0x0101;
pub const WM_SYSKEYDOWN: u32 = 0x0104;
pub const WM_SYSKEYUP: u32 = 0x0105;

/// Which keyboard message the hook received.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyTransition {
    KeyDown,
    KeyUp,
    /// Key pressed while Alt is held, or F10.
    SysKeyDown,
    SysKeyUp,
}

impl KeyTransition {
    pub fn from_message(message: u32) -> Option<Self> {
        match message {
            WM_KEYDOWN => Some(KeyTransition::KeyDown),
            WM_KEYUP => Some(KeyTransition::KeyUp),
            WM_SYSKEYDOWN => Some(KeyTransition::SysKeyDown),
            WM_SYSKEYUP => Some(KeyTransition::SysKeyUp),
            _ => None,
        }
    }

    /// Only presses are matched against hotkeys.
    pub fn is_press(&self) -> bool {
        matches!(self, KeyTransition::KeyDown | KeyTransition::SysKeyDown)
    }
}

/// A decoded low-level keyboard event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawKeyEvent {
    /// Windows Virtual Key code.
    pub vk_code: u8,
    pub transition: KeyTransition,
}

impl RawKeyEvent {
    pub fn key_down(vk_code: u8) -> Self {
        Self {
            vk_code,
            transition: KeyTransition::KeyDown,
        }
    }
}

/// Decodes the raw hook arguments.
///
/// Returns `None` when `n_code` says the message must not be processed, the
/// message is not a keyboard transition, or the key code does not fit a
/// Virtual Key.
pub fn decode_hook_event(n_code: i32, message: u32, vk_code: u32) -> Option<RawKeyEvent> {
    if n_code != HC_ACTION {
        return None;
    }
    let transition = KeyTransition::from_message(message)?;
    let vk_code = u8::try_from(vk_code).ok()?;
    Some(RawKeyEvent { vk_code, transition })
}

// ── Hook seams ────────────────────────────────────────────────────────────────

/// What the hook should do with the keystroke it just saw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookDecision {
    /// Pass the keystroke on to the next hook and the focused application.
    Forward,
    /// Swallow the keystroke system-wide.
    Consume,
}

/// Receives every decoded keystroke on the hook thread.
pub trait KeystrokeSink: Send + Sync + 'static {
    fn on_key(&self, event: RawKeyEvent) -> HookDecision;
}

/// An installed hook. Uninstalling is idempotent.
pub trait HookGuard: Send {
    fn uninstall(&mut self);
}

/// Installs the process-wide keyboard hook.
pub trait HookInstaller {
    /// Installs the hook and routes every keystroke to `sink` until the
    /// returned guard is uninstalled.
    ///
    /// # Errors
    ///
    /// Returns [`HookError::InstallFailed`] if the operating system refuses
    /// the hook.
    fn install(&self, sink: Arc<dyn KeystrokeSink>) -> Result<Box<dyn HookGuard>, HookError>;
}

/// The foreground window as reported by the window manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowInfo {
    pub handle: i64,
    pub process_id: u32,
}

/// Live desktop state sampled on every keystroke.
pub trait Desktop: Send + Sync {
    /// The current foreground window, or `None` while there is none (for
    /// example during a window switch).
    fn foreground_window(&self) -> Option<WindowInfo>;

    /// The modifier keys held right now.
    fn modifiers(&self) -> KeyModifiers;
}

/// Error type for hook installation.
#[derive(Debug, thiserror::Error)]
pub enum HookError {
    #[error("failed to install keyboard hook: {0}")]
    InstallFailed(String),
    #[error("failed to start callback worker: {0}")]
    WorkerSpawnFailed(#[from] std::io::Error),
    #[error("platform not supported: {0}")]
    UnsupportedPlatform(String),
}
