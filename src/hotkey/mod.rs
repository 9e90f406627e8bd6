//! Global hotkeys
//!
//! Parsing of shortcut text, id allocation and dispatch, OS registration
//! and the blocking message loop that reports fired hotkeys.

mod binding;
mod listener;
mod registry;
mod spec;

#[cfg(windows)]
mod win32;

pub use binding::{
    build_bindings, BindingTable, HotkeyBinding, HotkeyKind, HotkeyTarget, HOTKEY_RATE_BASE,
    HOTKEY_RES_BASE, MAX_BINDINGS_PER_KIND,
};
pub use listener::{run_message_loop, ListenerError, LoopExit, LoopMessage, MessageSource};
pub use registry::{HotkeyBackend, HotkeyRegistry, RegistrationError};
pub use spec::{parse_hotkey, HotkeySpec, KeyCode, Modifiers, ParseError};

#[cfg(windows)]
pub use win32::{HotkeyThread, Win32Hotkeys, Win32MessageSource};
