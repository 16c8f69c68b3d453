//! Domain value types shared by host and plugin processes.
//!
//! - **`hotkey`** – The immutable [`hotkey::HotKey`] value (key code plus
//!   modifier bits) and the scope a registration is restricted to.
//! - **`host`** – The host's window identity and the lifecycle events the
//!   host broadcasts to subscribed plugins.

pub mod host;
pub mod hotkey;
