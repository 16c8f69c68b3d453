//! Named hotkey bindings.
//!
//! A plugin binds actions by name, each with a default hotkey and scope.
//! Configuration may override the hotkey of any action, and an action can be
//! rebound at runtime; the previous hotkey is released first.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use interop_core::{HotKey, HotKeyParseError, HotKeyScope};
use interop_hook::{HotKeyCallback, KeyboardHookEngine};
use parking_lot::Mutex;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum BindingError {
    #[error("invalid hotkey for action '{action}': {source}")]
    InvalidHotKey {
        action: String,
        #[source]
        source: HotKeyParseError,
    },

    #[error("no action named '{0}' is bound")]
    UnknownAction(String),

    #[error("keyboard hook engine has been disposed")]
    EngineDisposed,
}

struct Binding {
    hotkey: HotKey,
    scope: HotKeyScope,
    callback: HotKeyCallback,
}

pub struct HotKeyBindings {
    engine: Arc<KeyboardHookEngine>,
    overrides: HashMap<String, HotKey>,
    bound: Mutex<HashMap<String, Binding>>,
}

impl HotKeyBindings {
    /// Parses `overrides` (action name to hotkey text, e.g. `"Ctrl+Alt+K"`).
    ///
    /// # Errors
    ///
    /// Returns [`BindingError::InvalidHotKey`] naming the first action whose
    /// hotkey text does not parse.
    pub fn new(
        engine: Arc<KeyboardHookEngine>,
        overrides: &BTreeMap<String, String>,
    ) -> Result<Self, BindingError> {
        let overrides = overrides
            .iter()
            .map(|(action, text)| {
                HotKey::parse(text)
                    .map(|hotkey| (action.clone(), hotkey))
                    .map_err(|source| BindingError::InvalidHotKey {
                        action: action.clone(),
                        source,
                    })
            })
            .collect::<Result<HashMap<_, _>, _>>()?;

        Ok(Self {
            engine,
            overrides,
            bound: Mutex::new(HashMap::new()),
        })
    }

    /// Binds `action` to its configured hotkey, or `default` if none is
    /// configured. Returns the hotkey actually bound.
    ///
    /// # Errors
    ///
    /// Returns [`BindingError::EngineDisposed`] once the engine is gone.
    pub fn bind(
        &self,
        action: &str,
        default: HotKey,
        scope: HotKeyScope,
        callback: HotKeyCallback,
    ) -> Result<HotKey, BindingError> {
        let hotkey = self.overrides.get(action).copied().unwrap_or(default);
        self.install(action, Binding { hotkey, scope, callback })?;
        Ok(hotkey)
    }

    /// Moves `action` to `hotkey`, keeping its scope and callback.
    ///
    /// # Errors
    ///
    /// Returns [`BindingError::UnknownAction`] if `action` was never bound.
    pub fn rebind(&self, action: &str, hotkey: HotKey) -> Result<(), BindingError> {
        let (scope, callback) = {
            let bound = self.bound.lock();
            let binding = bound
                .get(action)
                .ok_or_else(|| BindingError::UnknownAction(action.to_string()))?;
            (binding.scope, Arc::clone(&binding.callback))
        };
        self.install(action, Binding { hotkey, scope, callback })
    }

    /// Releases `action`. Returns `false` if it was not bound.
    pub fn unbind(&self, action: &str) -> bool {
        match self.bound.lock().remove(action) {
            Some(binding) => {
                self.engine.unregister(&binding.hotkey);
                true
            }
            None => false,
        }
    }

    pub fn hotkey_for(&self, action: &str) -> Option<HotKey> {
        self.bound.lock().get(action).map(|b| b.hotkey)
    }

    /// Bound actions with their hotkeys, sorted by action name.
    pub fn actions(&self) -> Vec<(String, HotKey)> {
        let mut actions: Vec<_> = self
            .bound
            .lock()
            .iter()
            .map(|(name, binding)| (name.clone(), binding.hotkey))
            .collect();
        actions.sort_by(|a, b| a.0.cmp(&b.0));
        actions
    }

    /// Releases every binding.
    pub fn clear(&self) {
        for (_, binding) in self.bound.lock().drain() {
            self.engine.unregister(&binding.hotkey);
        }
    }

    fn install(&self, action: &str, binding: Binding) -> Result<(), BindingError> {
        let mut bound = self.bound.lock();

        // One hotkey drives one action; the newest binding takes it over.
        let shadowed = bound
            .iter()
            .find(|(name, b)| name.as_str() != action && b.hotkey == binding.hotkey)
            .map(|(name, _)| name.clone());
        if let Some(other) = shadowed {
            warn!(
                action,
                hotkey = %binding.hotkey,
                shadowed = %other,
                "hotkey taken over from another action"
            );
            bound.remove(&other);
        }

        if let Some(previous) = bound.remove(action) {
            self.engine.unregister(&previous.hotkey);
        }

        if !self
            .engine
            .register(binding.hotkey, Arc::clone(&binding.callback), binding.scope)
        {
            return Err(BindingError::EngineDisposed);
        }

        info!(action, hotkey = %binding.hotkey, scope = %binding.scope, "hotkey bound");
        bound.insert(action.to_string(), binding);
        Ok(())
    }
}
