//! Scope resolution: does a keystroke belong to the host right now?
//!
//! The resolver compares the foreground window against the host's main
//! window and process, as last recorded in [`HostContext`]. The context is
//! written by whoever learns about the host (lifecycle notifications, an
//! explicit refresh) and read on every keystroke, so it is lock-free.

use std::sync::atomic::{AtomicI64, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use interop_core::{HostWindow, HotKeyScope};
use parking_lot::Mutex;

use crate::infrastructure::WindowInfo;

/// Last known identity of the host's main window.
///
/// Zero in either field means "unknown".
#[derive(Debug, Default)]
pub struct HostContext {
    handle: AtomicI64,
    process_id: AtomicU32,
}

impl HostContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&self, window: HostWindow) {
        self.process_id.store(window.process_id, Ordering::Release);
        self.handle.store(window.handle, Ordering::Release);
    }

    pub fn clear(&self) {
        self.handle.store(0, Ordering::Release);
        self.process_id.store(0, Ordering::Release);
    }

    pub fn handle(&self) -> i64 {
        self.handle.load(Ordering::Acquire)
    }

    pub fn process_id(&self) -> u32 {
        self.process_id.load(Ordering::Acquire)
    }

    /// The recorded window, if both handle and process are known.
    pub fn window(&self) -> Option<HostWindow> {
        let handle = self.handle();
        let process_id = self.process_id();
        (handle != 0 && process_id != 0).then(|| HostWindow::new(handle, process_id))
    }
}

/// Asks the host where its main window is.
#[cfg_attr(test, mockall::automock)]
pub trait HostLocator: Send + Sync {
    /// Returns `None` when the host cannot be reached or has no window yet.
    fn current_host_window(&self) -> Option<HostWindow>;
}

/// Outcome of a scope check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeDecision {
    Match,
    NoMatch,
    /// The scope needs the host window but none is recorded.
    HostUnknown,
}

/// Decides whether a hotkey's scope is satisfied by the foreground window.
pub struct ScopeResolver {
    context: Arc<HostContext>,
    locator: Option<Arc<dyn HostLocator>>,
    refresh_interval: Duration,
    last_refresh: Mutex<Option<Instant>>,
}

impl ScopeResolver {
    pub fn new(context: Arc<HostContext>) -> Self {
        Self {
            context,
            locator: None,
            refresh_interval: Duration::from_secs(1),
            last_refresh: Mutex::new(None),
        }
    }

    pub fn with_locator(mut self, locator: Arc<dyn HostLocator>) -> Self {
        self.locator = Some(locator);
        self
    }

    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }

    pub fn context(&self) -> &Arc<HostContext> {
        &self.context
    }

    /// Pure check of `scope` against `foreground`. Never blocks.
    pub fn resolve(&self, scope: HotKeyScope, foreground: Option<WindowInfo>) -> ScopeDecision {
        // Window scope needs the host handle, process scope only its pid.
        let tracked = match scope {
            HotKeyScope::Window => self.context.handle(),
            HotKeyScope::Process => i64::from(self.context.process_id()),
            HotKeyScope::Global => return ScopeDecision::Match,
        };
        if tracked == 0 {
            return ScopeDecision::HostUnknown;
        }

        let Some(foreground) = foreground else {
            return ScopeDecision::NoMatch;
        };

        let matched = match scope {
            HotKeyScope::Window => foreground.handle == tracked,
            _ => i64::from(foreground.process_id) == tracked,
        };

        if matched {
            ScopeDecision::Match
        } else {
            ScopeDecision::NoMatch
        }
    }

    /// Claims the next refresh slot.
    ///
    /// Returns `true` at most once per refresh interval, and never when no
    /// locator is configured.
    pub fn claim_refresh(&self) -> bool {
        if self.locator.is_none() {
            return false;
        }
        let mut last = self.last_refresh.lock();
        let now = Instant::now();
        match *last {
            Some(at) if now.duration_since(at) < self.refresh_interval => false,
            _ => {
                *last = Some(now);
                true
            }
        }
    }

    /// Queries the locator and records the result.
    ///
    /// May block on the host; must not be called from the hook thread.
    pub fn refresh(&self) -> Option<HostWindow> {
        let locator = self.locator.as_ref()?;
        match locator.current_host_window() {
            Some(window) => {
                self.context.update(window);
                tracing::debug!(
                    handle = window.handle,
                    process_id = window.process_id,
                    "host window refreshed"
                );
                Some(window)
            }
            None => {
                tracing::warn!("host window is still unknown after refresh");
                None
            }
        }
    }
}
