//! # interop-hook
//!
//! A system-wide keyboard hook that turns key combinations into plugin
//! callbacks, but only while the right window is in front.
//!
//! # Architecture
//!
//! - **`application`** – OS-independent logic: the hotkey registry and
//!   per-keystroke dispatch, the scope resolver with its host context, the
//!   callback worker thread, and the [`KeyboardHookEngine`] that ties them
//!   together.
//! - **`infrastructure`** – The seams to the operating system
//!   ([`infrastructure::HookInstaller`], [`infrastructure::Desktop`]), the
//!   Windows implementations, and in-memory doubles for tests.
//!
//! The hook callback itself does nothing but a registry lookup, a scope check
//! and a queue push. Plugin callbacks always run later, on the worker thread.

pub mod application;
pub mod infrastructure;

pub use application::dispatch::{
    HotKeyCallback, HotKeyDispatcher, KeystrokeObserver, RegisteredHotKey,
};
pub use application::engine::{EngineOptions, KeyboardHookEngine};
pub use application::scope::{HostContext, HostLocator, ScopeDecision, ScopeResolver};
pub use application::worker::CallbackWorker;
pub use infrastructure::{
    Desktop, HookDecision, HookError, HookGuard, HookInstaller, KeyTransition, KeystrokeSink,
    RawKeyEvent, WindowInfo,
};
