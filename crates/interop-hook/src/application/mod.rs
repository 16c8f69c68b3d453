//! OS-independent hotkey logic.

pub mod dispatch;
pub mod engine;
pub mod scope;
pub mod worker;
