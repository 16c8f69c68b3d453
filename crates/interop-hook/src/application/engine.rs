//! Keyboard hook engine: the public face of the hotkey subsystem.
//!
//! Owns the installed OS hook, the dispatcher it feeds, and the callback
//! worker. Dropping the engine disposes it.

use std::sync::Arc;
use std::time::Duration;

use interop_core::{HotKey, HotKeyScope};
use parking_lot::Mutex;

use super::dispatch::{HotKeyCallback, HotKeyDispatcher, KeystrokeObserver};
use super::scope::ScopeResolver;
use super::worker::CallbackWorker;
use crate::infrastructure::{Desktop, HookError, HookGuard, HookInstaller, KeystrokeSink};

/// Tuning knobs for [`KeyboardHookEngine`].
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// How long `dispose` waits for queued callbacks before detaching the worker.
    pub shutdown_timeout: Duration,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            shutdown_timeout: Duration::from_millis(1500),
        }
    }
}

pub struct KeyboardHookEngine {
    dispatcher: Arc<HotKeyDispatcher>,
    worker: Arc<CallbackWorker>,
    guard: Mutex<Option<Box<dyn HookGuard>>>,
    options: EngineOptions,
}

impl KeyboardHookEngine {
    /// Starts the callback worker and installs the hook.
    ///
    /// # Errors
    ///
    /// Returns [`HookError`] if the worker cannot start or the hook cannot be
    /// installed. Nothing is left running on error.
    pub fn install(
        installer: &dyn HookInstaller,
        desktop: Arc<dyn Desktop>,
        resolver: ScopeResolver,
        options: EngineOptions,
    ) -> Result<Self, HookError> {
        let worker = Arc::new(CallbackWorker::start("interop-hotkey-worker")?);
        let dispatcher = Arc::new(HotKeyDispatcher::new(
            Arc::new(resolver),
            desktop,
            Arc::clone(&worker),
        ));

        let guard = match installer.install(Arc::clone(&dispatcher) as Arc<dyn KeystrokeSink>) {
            Ok(guard) => guard,
            Err(e) => {
                worker.shutdown(options.shutdown_timeout);
                return Err(e);
            }
        };

        tracing::info!("keyboard hook engine started");
        Ok(Self {
            dispatcher,
            worker,
            guard: Mutex::new(Some(guard)),
            options,
        })
    }

    /// Binds `callback` to `hotkey` within `scope`, replacing any existing
    /// binding. Returns `false` after disposal.
    pub fn register(&self, hotkey: HotKey, callback: HotKeyCallback, scope: HotKeyScope) -> bool {
        if self.dispatcher.is_disposed() {
            return false;
        }
        self.dispatcher.register(hotkey, callback, scope);
        true
    }

    pub fn unregister(&self, hotkey: &HotKey) -> bool {
        self.dispatcher.unregister(hotkey)
    }

    pub fn is_registered(&self, hotkey: &HotKey) -> bool {
        self.dispatcher.is_registered(hotkey)
    }

    /// Sets or clears the observer called for every key pressed with at
    /// least one modifier.
    pub fn set_global_observer(&self, observer: Option<KeystrokeObserver>) {
        self.dispatcher.set_observer(observer);
    }

    pub fn is_disposed(&self) -> bool {
        self.dispatcher.is_disposed()
    }

    /// Removes the hook and stops the worker. Idempotent.
    pub fn dispose(&self) {
        if self.dispatcher.is_disposed() {
            return;
        }
        self.dispatcher.mark_disposed();

        if let Some(mut guard) = self.guard.lock().take() {
            guard.uninstall();
        }
        if !self.worker.shutdown(self.options.shutdown_timeout) {
            tracing::warn!("hotkey callbacks still running at dispose");
        }
        tracing::info!("keyboard hook engine stopped");
    }
}

impl Drop for KeyboardHookEngine {
    fn drop(&mut self) {
        self.dispose();
    }
}
