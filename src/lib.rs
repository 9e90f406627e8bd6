//! Resolution Changer Library
//!
//! Tray utility that switches the primary display between configured
//! resolutions and refresh rates from a menu or global hotkeys, and keeps
//! the menu checkmarks in sync with the real display mode.
//!
//! Architecture:
//! - Coordinator owns the shared display state (coordinator module)
//! - Menu workers, the hotkey worker and the poll loop all feed it
//! - Hotkeys are parsed, registered and dispatched on their own thread (hotkey module)
//! - Tray widgets stay on the main thread (tray module, Windows only)

pub mod config;
pub mod coordinator;
pub mod display;
pub mod hotkey;
pub mod poller;

#[cfg(windows)]
pub mod tray;
