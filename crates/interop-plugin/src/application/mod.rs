pub mod hotkeys;
pub mod session;
