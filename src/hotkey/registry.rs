//! Hotkey registration lifecycle
//!
//! The registry owns which ids are live at the OS level. A binding that
//! fails to register is logged and skipped; it never stops the remaining
//! bindings from registering.

use tracing::{debug, info, warn};

use super::binding::HotkeyBinding;
use super::spec::{KeyCode, Modifiers};

/// Registration failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistrationError {
    #[error("hotkey id {id} could not be registered: {reason}")]
    Rejected { id: i32, reason: String },

    #[error("hotkey id {0} is already registered")]
    DuplicateId(i32),
}

/// OS hotkey primitives
pub trait HotkeyBackend {
    /// Bind `modifiers + key` to `id` for the whole process
    fn register(
        &mut self,
        id: i32,
        modifiers: Modifiers,
        key: KeyCode,
    ) -> Result<(), RegistrationError>;

    /// Release `id`
    fn unregister(&mut self, id: i32) -> Result<(), RegistrationError>;
}

/// Tracks registered ids on top of a backend
pub struct HotkeyRegistry<B: HotkeyBackend> {
    backend: B,
    registered: Vec<i32>,
}

impl<B: HotkeyBackend> HotkeyRegistry<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            registered: Vec::new(),
        }
    }

    /// Register a single id
    pub fn register(
        &mut self,
        id: i32,
        modifiers: Modifiers,
        key: KeyCode,
    ) -> Result<(), RegistrationError> {
        if self.registered.contains(&id) {
            return Err(RegistrationError::DuplicateId(id));
        }
        self.backend.register(id, modifiers, key)?;
        self.registered.push(id);
        Ok(())
    }

    /// Register every binding, returning the ids that succeeded
    pub fn register_bindings(&mut self, bindings: &[HotkeyBinding]) -> Vec<i32> {
        let mut live = Vec::with_capacity(bindings.len());

        for binding in bindings {
            match self.register(binding.id, binding.spec.modifiers, binding.spec.key) {
                Ok(()) => {
                    info!(
                        id = binding.id,
                        hotkey = %binding.spec,
                        action = %binding.action,
                        "hotkey registered"
                    );
                    live.push(binding.id);
                }
                Err(e) => {
                    warn!(hotkey = %binding.spec, action = %binding.action, "{}", e);
                }
            }
        }

        live
    }

    /// Best-effort release of one id
    pub fn unregister(&mut self, id: i32) {
        if let Err(e) = self.backend.unregister(id) {
            debug!("ignoring unregister failure: {}", e);
        }
        self.registered.retain(|r| *r != id);
    }

    /// Best-effort release of every registered id
    pub fn unregister_all(&mut self) {
        for id in std::mem::take(&mut self.registered) {
            if let Err(e) = self.backend.unregister(id) {
                debug!("ignoring unregister failure: {}", e);
            }
        }
    }

    pub fn registered_ids(&self) -> &[i32] {
        &self.registered
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }
}
