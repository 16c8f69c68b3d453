//! In-memory hook and desktop doubles.
//!
//! [`ManualHookInstaller`] stands in for the OS hook: tests call
//! [`ManualHookInstaller::feed`] with the same arguments Windows would pass
//! to the hook procedure and get back the decision the hook would return.

use std::sync::Arc;

use interop_core::KeyModifiers;
use parking_lot::{Mutex, RwLock};

use super::{
    decode_hook_event, Desktop, HookDecision, HookError, HookGuard, HookInstaller, KeystrokeSink,
    RawKeyEvent, WindowInfo, HC_ACTION, WM_KEYDOWN, WM_KEYUP,
};

// ── Desktop ───────────────────────────────────────────────────────────────────

/// A desktop whose foreground window and held modifiers are set by the test.
#[derive(Default)]
pub struct MockDesktop {
    foreground: RwLock<Option<WindowInfo>>,
    modifiers: RwLock<KeyModifiers>,
}

impl MockDesktop {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_foreground(handle: i64, process_id: u32) -> Self {
        let desktop = Self::new();
        desktop.set_foreground(Some(WindowInfo { handle, process_id }));
        desktop
    }

    pub fn set_foreground(&self, window: Option<WindowInfo>) {
        *self.foreground.write() = window;
    }

    pub fn set_modifiers(&self, modifiers: KeyModifiers) {
        *self.modifiers.write() = modifiers;
    }
}

impl Desktop for MockDesktop {
    fn foreground_window(&self) -> Option<WindowInfo> {
        *self.foreground.read()
    }

    fn modifiers(&self) -> KeyModifiers {
        *self.modifiers.read()
    }
}

// ── Hook installer ────────────────────────────────────────────────────────────

#[derive(Default)]
struct InstallerState {
    sink: Option<Arc<dyn KeystrokeSink>>,
    installs: usize,
    uninstalls: usize,
}

/// A hook installer driven by hand.
///
/// Clones share state, so a test can keep one clone for feeding keystrokes
/// after handing another to the engine.
#[derive(Clone, Default)]
pub struct ManualHookInstaller {
    state: Arc<Mutex<InstallerState>>,
    refuse: bool,
}

impl ManualHookInstaller {
    pub fn new() -> Self {
        Self::default()
    }

    /// An installer whose every install attempt fails.
    pub fn refusing() -> Self {
        Self {
            refuse: true,
            ..Self::default()
        }
    }

    /// Delivers raw hook arguments exactly as the OS would.
    ///
    /// Returns [`HookDecision::Forward`] when no hook is installed or the
    /// arguments do not decode to a keystroke.
    pub fn feed(&self, n_code: i32, message: u32, vk_code: u32) -> HookDecision {
        let Some(event) = decode_hook_event(n_code, message, vk_code) else {
            return HookDecision::Forward;
        };
        self.deliver(event)
    }

    pub fn key_down(&self, vk_code: u8) -> HookDecision {
        self.feed(HC_ACTION, WM_KEYDOWN, u32::from(vk_code))
    }

    pub fn key_up(&self, vk_code: u8) -> HookDecision {
        self.feed(HC_ACTION, WM_KEYUP, u32::from(vk_code))
    }

    pub fn deliver(&self, event: RawKeyEvent) -> HookDecision {
        // Clone the sink out so the sink never runs under the state lock.
        let sink = self.state.lock().sink.clone();
        match sink {
            Some(sink) => sink.on_key(event),
            None => HookDecision::Forward,
        }
    }

    pub fn is_installed(&self) -> bool {
        self.state.lock().sink.is_some()
    }

    pub fn install_count(&self) -> usize {
        self.state.lock().installs
    }

    pub fn uninstall_count(&self) -> usize {
        self.state.lock().uninstalls
    }
}

impl HookInstaller for ManualHookInstaller {
    fn install(&self, sink: Arc<dyn KeystrokeSink>) -> Result<Box<dyn HookGuard>, HookError> {
        if self.refuse {
            return Err(HookError::InstallFailed("installer refuses by configuration".to_string()));
        }
        let mut state = self.state.lock();
        state.sink = Some(sink);
        state.installs += 1;
        Ok(Box::new(ManualHookGuard {
            state: Arc::clone(&self.state),
            installed: true,
        }))
    }
}

struct ManualHookGuard {
    state: Arc<Mutex<InstallerState>>,
    installed: bool,
}

impl HookGuard for ManualHookGuard {
    fn uninstall(&mut self) {
        if !self.installed {
            return;
        }
        self.installed = false;
        let mut state = self.state.lock();
        state.sink = None;
        state.uninstalls += 1;
    }
}
