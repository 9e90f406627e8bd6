//! Win32 hotkey glue: RegisterHotKey backend, GetMessageW source and the
//! dedicated listener thread.
//!
//! Hotkeys registered without a window are delivered to the message queue of
//! the registering thread, so registration, the message loop and
//! unregistration all happen on the same thread.

use crate::config::AppConfig;
use crate::display::DisplayAction;
use crossbeam::channel::{bounded, Sender};
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};
use windows::Win32::Foundation::{HWND, LPARAM, WPARAM};
use windows::Win32::System::Threading::GetCurrentThreadId;
use windows::Win32::UI::Input::KeyboardAndMouse::{
    RegisterHotKey, UnregisterHotKey, HOT_KEY_MODIFIERS, MOD_NOREPEAT,
};
use windows::Win32::UI::WindowsAndMessaging::{
    GetMessageW, PeekMessageW, PostThreadMessageW, MSG, PM_NOREMOVE, WM_HOTKEY, WM_QUIT, WM_USER,
};

use super::binding::{build_bindings, BindingTable};
use super::listener::{run_message_loop, ListenerError, LoopMessage, MessageSource};
use super::registry::{HotkeyBackend, HotkeyRegistry, RegistrationError};
use super::spec::{KeyCode, Modifiers};

/// Thread-scoped RegisterHotKey backend
#[derive(Debug, Default)]
pub struct Win32Hotkeys;

impl HotkeyBackend for Win32Hotkeys {
    fn register(
        &mut self,
        id: i32,
        modifiers: Modifiers,
        key: KeyCode,
    ) -> Result<(), RegistrationError> {
        let flags = HOT_KEY_MODIFIERS(modifiers.bits()) | MOD_NOREPEAT;
        unsafe { RegisterHotKey(HWND::default(), id, flags, key.code()) }.map_err(|e| {
            RegistrationError::Rejected {
                id,
                reason: e.to_string(),
            }
        })
    }

    fn unregister(&mut self, id: i32) -> Result<(), RegistrationError> {
        unsafe { UnregisterHotKey(HWND::default(), id) }.map_err(|e| {
            RegistrationError::Rejected {
                id,
                reason: e.to_string(),
            }
        })
    }
}

/// GetMessageW on the current thread's queue
#[derive(Debug, Default)]
pub struct Win32MessageSource;

impl MessageSource for Win32MessageSource {
    fn next_message(&mut self) -> Result<LoopMessage, ListenerError> {
        let mut msg = MSG::default();
        let result = unsafe { GetMessageW(&mut msg, HWND::default(), 0, 0) };

        match result.0 {
            -1 => Err(ListenerError::Retrieve(
                windows::core::Error::from_win32().to_string(),
            )),
            0 => Ok(LoopMessage::Quit),
            _ if msg.message == WM_HOTKEY => Ok(LoopMessage::Hotkey(msg.wParam.0 as i32)),
            _ => Ok(LoopMessage::Other),
        }
    }
}

/// Handle to the running hotkey thread
pub struct HotkeyThread {
    thread_id: u32,
    handle: Option<JoinHandle<()>>,
}

impl HotkeyThread {
    /// Register every configured hotkey on a new thread and forward fired
    /// hotkeys as actions on `actions`.
    ///
    /// Returns once the thread has its message queue, so `request_shutdown`
    /// is safe to call immediately.
    pub fn spawn(
        config: &AppConfig,
        actions: Sender<DisplayAction>,
    ) -> Result<Self, ListenerError> {
        let config = config.clone();
        let (ready_tx, ready_rx) = bounded::<u32>(1);

        let handle = thread::Builder::new()
            .name("hotkey-listener".to_string())
            .spawn(move || {
                // Force creation of this thread's message queue before anyone
                // can post to it
                let mut msg = MSG::default();
                unsafe {
                    let _ = PeekMessageW(&mut msg, HWND::default(), WM_USER, WM_USER, PM_NOREMOVE);
                }
                let _ = ready_tx.send(unsafe { GetCurrentThreadId() });

                let bindings = build_bindings(&config);
                let mut registry = HotkeyRegistry::new(Win32Hotkeys);
                let mut table = BindingTable::new(&config);
                for id in registry.register_bindings(&bindings) {
                    table.mark_registered(id);
                }
                info!(
                    "{} of {} hotkeys registered",
                    registry.registered_ids().len(),
                    bindings.len()
                );

                let exit = run_message_loop(&mut Win32MessageSource, |id| {
                    match table.resolve(id) {
                        Some(action) => {
                            if actions.send(action).is_err() {
                                warn!(id, "hotkey dispatcher is gone, dropping {}", action);
                            }
                        }
                        None => debug!(id, "hotkey id has no live binding"),
                    }
                });
                debug!(?exit, "hotkey loop finished");

                registry.unregister_all();
                info!("hotkeys unregistered");
            })
            .map_err(|e| ListenerError::ThreadSpawn(e.to_string()))?;

        let thread_id = ready_rx
            .recv()
            .map_err(|_| ListenerError::ThreadSpawn("hotkey thread exited early".to_string()))?;

        Ok(Self {
            thread_id,
            handle: Some(handle),
        })
    }

    /// Post a quit message to the listener and wait for it to unregister
    pub fn request_shutdown(&mut self) {
        let posted =
            unsafe { PostThreadMessageW(self.thread_id, WM_QUIT, WPARAM(0), LPARAM(0)) };
        if let Err(e) = posted {
            warn!("failed to post quit to hotkey thread: {}", e);
            return;
        }

        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
