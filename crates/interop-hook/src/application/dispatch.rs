//! Hotkey registry and per-keystroke dispatch.
//!
//! [`HotKeyDispatcher::on_key`] runs on the hook thread for every keystroke.
//! It takes no locks that a callback could hold, performs no I/O, and never
//! runs plugin code other than the optional observer. Registered callbacks
//! are handed to the [`CallbackWorker`].

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use interop_core::{HotKey, HotKeyScope};
use parking_lot::RwLock;

use super::scope::{ScopeDecision, ScopeResolver};
use super::worker::CallbackWorker;
use crate::infrastructure::{Desktop, HookDecision, KeystrokeSink, RawKeyEvent};

/// Action bound to a hotkey.
pub type HotKeyCallback = Arc<dyn Fn() + Send + Sync + 'static>;

/// Sees every modifier-bearing key combination, registered or not.
pub type KeystrokeObserver = Arc<dyn Fn(HotKey) + Send + Sync + 'static>;

#[derive(Clone)]
pub struct RegisteredHotKey {
    pub callback: HotKeyCallback,
    pub scope: HotKeyScope,
}

impl std::fmt::Debug for RegisteredHotKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredHotKey").field("scope", &self.scope).finish_non_exhaustive()
    }
}

pub struct HotKeyDispatcher {
    registry: DashMap<HotKey, RegisteredHotKey>,
    observer: RwLock<Option<KeystrokeObserver>>,
    resolver: Arc<ScopeResolver>,
    desktop: Arc<dyn Desktop>,
    worker: Arc<CallbackWorker>,
    disposed: AtomicBool,
}

impl HotKeyDispatcher {
    pub fn new(
        resolver: Arc<ScopeResolver>,
        desktop: Arc<dyn Desktop>,
        worker: Arc<CallbackWorker>,
    ) -> Self {
        Self {
            registry: DashMap::new(),
            observer: RwLock::new(None),
            resolver,
            desktop,
            worker,
            disposed: AtomicBool::new(false),
        }
    }

    /// Binds `hotkey`, replacing any previous binding for the same combination.
    pub fn register(&self, hotkey: HotKey, callback: HotKeyCallback, scope: HotKeyScope) {
        if self.registry.insert(hotkey, RegisteredHotKey { callback, scope }).is_some() {
            tracing::debug!(%hotkey, %scope, "hotkey binding replaced");
        } else {
            tracing::debug!(%hotkey, %scope, "hotkey registered");
        }
    }

    /// Returns `true` if a binding was removed.
    pub fn unregister(&self, hotkey: &HotKey) -> bool {
        self.registry.remove(hotkey).is_some()
    }

    pub fn is_registered(&self, hotkey: &HotKey) -> bool {
        self.registry.contains_key(hotkey)
    }

    pub fn len(&self) -> usize {
        self.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    pub fn set_observer(&self, observer: Option<KeystrokeObserver>) {
        *self.observer.write() = observer;
    }

    /// After this, every keystroke is forwarded untouched.
    pub fn mark_disposed(&self) {
        self.disposed.store(true, Ordering::SeqCst);
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    fn notify_observer(&self, hotkey: HotKey) {
        let observer = self.observer.read().clone();
        if let Some(observer) = observer {
            if panic::catch_unwind(AssertUnwindSafe(|| observer(hotkey))).is_err() {
                tracing::error!(%hotkey, "keystroke observer panicked");
            }
        }
    }

    fn schedule_refresh(&self, hotkey: HotKey, scope: HotKeyScope) {
        if !self.resolver.claim_refresh() {
            return;
        }
        tracing::warn!(%hotkey, %scope, "host window unknown for scoped hotkey; refreshing");
        let resolver = Arc::clone(&self.resolver);
        self.worker.submit(Box::new(move || {
            resolver.refresh();
        }));
    }
}

impl KeystrokeSink for HotKeyDispatcher {
    fn on_key(&self, event: RawKeyEvent) -> HookDecision {
        if self.is_disposed() || !event.transition.is_press() {
            return HookDecision::Forward;
        }

        let hotkey = HotKey::new(event.vk_code, self.desktop.modifiers());
        if !hotkey.modifiers.is_empty() {
            self.notify_observer(hotkey);
        }

        // Clone the entry out so no shard lock is held past this line.
        let Some(entry) = self.registry.get(&hotkey).map(|e| e.value().clone()) else {
            return HookDecision::Forward;
        };

        match self.resolver.resolve(entry.scope, self.desktop.foreground_window()) {
            ScopeDecision::Match => {}
            ScopeDecision::NoMatch => return HookDecision::Forward,
            ScopeDecision::HostUnknown => {
                self.schedule_refresh(hotkey, entry.scope);
                return HookDecision::Forward;
            }
        }

        let callback = entry.callback;
        if self.worker.submit(Box::new(move || callback())) {
            HookDecision::Consume
        } else {
            HookDecision::Forward
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::scope::{HostContext, MockHostLocator};
    use crate::infrastructure::mock::MockDesktop;
    use crate::infrastructure::{KeyTransition, WindowInfo};
    use interop_core::{HostWindow, KeyModifiers};
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    const HOST_HANDLE: i64 = 1000;
    const HOST_PID: u32 = 42;
    const VK_K: u8 = 0x4B;

    struct Fixture {
        dispatcher: HotKeyDispatcher,
        desktop: Arc<MockDesktop>,
        worker: Arc<CallbackWorker>,
    }

    fn fixture(resolver: ScopeResolver) -> Fixture {
        let desktop = Arc::new(MockDesktop::with_foreground(HOST_HANDLE, HOST_PID));
        desktop.set_modifiers(KeyModifiers::from_flags(true, false, false, false));
        let worker = Arc::new(CallbackWorker::start("test-dispatch").unwrap());
        let dispatcher = HotKeyDispatcher::new(
            Arc::new(resolver),
            Arc::clone(&desktop) as Arc<dyn Desktop>,
            Arc::clone(&worker),
        );
        Fixture { dispatcher, desktop, worker }
    }

    fn known_host() -> ScopeResolver {
        let context = Arc::new(HostContext::new());
        context.update(HostWindow::new(HOST_HANDLE, HOST_PID));
        ScopeResolver::new(context)
    }

    fn ctrl_k() -> HotKey {
        HotKey::with_flags(VK_K, true, false, false, false)
    }

    fn counting_callback() -> (HotKeyCallback, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        let inner = Arc::clone(&count);
        (
            Arc::new(move || {
                inner.fetch_add(1, Ordering::SeqCst);
            }),
            count,
        )
    }

    fn drain(worker: &CallbackWorker) {
        assert!(worker.shutdown(Duration::from_secs(5)));
    }

    #[test]
    fn test_window_scope_fires_when_host_window_is_in_front() {
        // Arrange
        let f = fixture(known_host());
        let (callback, count) = counting_callback();
        f.dispatcher.register(ctrl_k(), callback, HotKeyScope::Window);

        // Act
        let decision = f.dispatcher.on_key(RawKeyEvent::key_down(VK_K));
        drain(&f.worker);

        // Assert
        assert_eq!(decision, HookDecision::Consume);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_window_scope_forwards_when_other_window_is_in_front() {
        // Arrange
        let f = fixture(known_host());
        let (callback, count) = counting_callback();
        f.dispatcher.register(ctrl_k(), callback, HotKeyScope::Window);
        f.desktop.set_foreground(Some(WindowInfo { handle: 2000, process_id: HOST_PID }));

        // Act
        let decision = f.dispatcher.on_key(RawKeyEvent::key_down(VK_K));
        drain(&f.worker);

        // Assert
        assert_eq!(decision, HookDecision::Forward);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_process_scope_fires_for_any_host_window() {
        let f = fixture(known_host());
        let (callback, count) = counting_callback();
        f.dispatcher.register(ctrl_k(), callback, HotKeyScope::Process);
        f.desktop.set_foreground(Some(WindowInfo { handle: 2000, process_id: HOST_PID }));

        assert_eq!(f.dispatcher.on_key(RawKeyEvent::key_down(VK_K)), HookDecision::Consume);
        drain(&f.worker);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_global_scope_fires_regardless_of_foreground() {
        let f = fixture(ScopeResolver::new(Arc::new(HostContext::new())));
        let (callback, count) = counting_callback();
        f.dispatcher.register(ctrl_k(), callback, HotKeyScope::Global);
        f.desktop.set_foreground(None);

        assert_eq!(f.dispatcher.on_key(RawKeyEvent::key_down(VK_K)), HookDecision::Consume);
        drain(&f.worker);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unregistered_and_released_keys_are_forwarded() {
        let f = fixture(known_host());
        let (callback, count) = counting_callback();
        f.dispatcher.register(ctrl_k(), callback, HotKeyScope::Global);

        let release = RawKeyEvent {
            vk_code: VK_K,
            transition: KeyTransition::KeyUp,
        };
        assert_eq!(f.dispatcher.on_key(release), HookDecision::Forward);
        assert_eq!(f.dispatcher.on_key(RawKeyEvent::key_down(0x4C)), HookDecision::Forward);

        f.desktop.set_modifiers(KeyModifiers::none());
        assert_eq!(f.dispatcher.on_key(RawKeyEvent::key_down(VK_K)), HookDecision::Forward);

        drain(&f.worker);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_register_replaces_and_unregister_reports_removal() {
        // Arrange
        let f = fixture(known_host());
        let (first, first_count) = counting_callback();
        let (second, second_count) = counting_callback();

        // Act
        f.dispatcher.register(ctrl_k(), first, HotKeyScope::Global);
        f.dispatcher.register(ctrl_k(), second, HotKeyScope::Global);
        f.dispatcher.on_key(RawKeyEvent::key_down(VK_K));
        let removed = f.dispatcher.unregister(&ctrl_k());
        let removed_again = f.dispatcher.unregister(&ctrl_k());
        let after_removal = f.dispatcher.on_key(RawKeyEvent::key_down(VK_K));
        drain(&f.worker);

        // Assert
        assert_eq!(f.dispatcher.len(), 0);
        assert!(removed);
        assert!(!removed_again);
        assert_eq!(after_removal, HookDecision::Forward);
        assert_eq!(first_count.load(Ordering::SeqCst), 0);
        assert_eq!(second_count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unknown_host_fails_closed_and_refreshes_once_on_worker() {
        // Arrange
        let mut locator = MockHostLocator::new();
        locator
            .expect_current_host_window()
            .times(1)
            .returning(|| Some(HostWindow::new(HOST_HANDLE, HOST_PID)));
        let resolver = ScopeResolver::new(Arc::new(HostContext::new()))
            .with_locator(Arc::new(locator))
            .with_refresh_interval(Duration::from_secs(60));
        let f = fixture(resolver);
        let (callback, count) = counting_callback();
        f.dispatcher.register(ctrl_k(), callback, HotKeyScope::Window);
        f.desktop.set_foreground(Some(WindowInfo { handle: 2000, process_id: 99 }));

        // Act
        let first = f.dispatcher.on_key(RawKeyEvent::key_down(VK_K));
        let second = f.dispatcher.on_key(RawKeyEvent::key_down(VK_K));
        drain(&f.worker);

        // Assert
        assert_eq!(first, HookDecision::Forward);
        assert_eq!(second, HookDecision::Forward);
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(f.dispatcher.resolver.context().handle(), HOST_HANDLE);
    }

    #[test]
    fn test_observer_sees_only_modifier_combinations() {
        // Arrange
        let f = fixture(known_host());
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        f.dispatcher.set_observer(Some(Arc::new(move |hk: HotKey| sink.lock().push(hk))));

        // Act
        f.dispatcher.on_key(RawKeyEvent::key_down(VK_K));
        f.desktop.set_modifiers(KeyModifiers::none());
        f.dispatcher.on_key(RawKeyEvent::key_down(0x41));

        // Assert
        assert_eq!(*seen.lock(), vec![ctrl_k()]);
    }

    #[test]
    fn test_panicking_observer_does_not_break_dispatch() {
        let f = fixture(known_host());
        let (callback, count) = counting_callback();
        f.dispatcher.register(ctrl_k(), callback, HotKeyScope::Global);
        f.dispatcher.set_observer(Some(Arc::new(|_| panic!("observer failure"))));

        assert_eq!(f.dispatcher.on_key(RawKeyEvent::key_down(VK_K)), HookDecision::Consume);
        drain(&f.worker);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_disposed_dispatcher_forwards_everything() {
        let f = fixture(known_host());
        let (callback, count) = counting_callback();
        f.dispatcher.register(ctrl_k(), callback, HotKeyScope::Global);

        f.dispatcher.mark_disposed();

        assert_eq!(f.dispatcher.on_key(RawKeyEvent::key_down(VK_K)), HookDecision::Forward);
        drain(&f.worker);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_keystroke_is_forwarded_when_worker_is_gone() {
        let f = fixture(known_host());
        let (callback, _count) = counting_callback();
        f.dispatcher.register(ctrl_k(), callback, HotKeyScope::Global);
        drain(&f.worker);

        assert_eq!(f.dispatcher.on_key(RawKeyEvent::key_down(VK_K)), HookDecision::Forward);
    }
}
