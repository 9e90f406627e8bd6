//! Hotkey bindings and id dispatch
//!
//! Each configured entry with a shortcut becomes a `HotkeyBinding`. OS
//! registration needs a flat integer id space, so ids are allocated from two
//! disjoint ranges (one per action kind) and mapped back to a
//! `HotkeyTarget` (kind + index into the configured list) on dispatch.

use crate::config::AppConfig;
use crate::display::{DisplayAction, RefreshRate, Resolution};
use std::collections::HashSet;
use tracing::warn;

use super::spec::{parse_hotkey, HotkeySpec};

/// First id handed out to resolution hotkeys
pub const HOTKEY_RES_BASE: i32 = 1000;
/// First id handed out to refresh-rate hotkeys
pub const HOTKEY_RATE_BASE: i32 = 2000;
/// Entries per kind that can receive an id
pub const MAX_BINDINGS_PER_KIND: usize = (HOTKEY_RATE_BASE - HOTKEY_RES_BASE) as usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HotkeyKind {
    Resolution,
    RefreshRate,
}

/// Which configured entry a hotkey id refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HotkeyTarget {
    pub kind: HotkeyKind,
    pub index: usize,
}

impl HotkeyTarget {
    pub fn resolution(index: usize) -> Self {
        Self {
            kind: HotkeyKind::Resolution,
            index,
        }
    }

    pub fn refresh_rate(index: usize) -> Self {
        Self {
            kind: HotkeyKind::RefreshRate,
            index,
        }
    }

    /// The OS-level id for this target, if the index fits its range
    pub fn id(self) -> Option<i32> {
        if self.index >= MAX_BINDINGS_PER_KIND {
            return None;
        }
        let base = match self.kind {
            HotkeyKind::Resolution => HOTKEY_RES_BASE,
            HotkeyKind::RefreshRate => HOTKEY_RATE_BASE,
        };
        Some(base + self.index as i32)
    }

    /// Classify an id by range membership alone
    pub fn from_id(id: i32) -> Option<Self> {
        if id >= HOTKEY_RATE_BASE {
            let index = (id - HOTKEY_RATE_BASE) as usize;
            (index < MAX_BINDINGS_PER_KIND).then(|| Self::refresh_rate(index))
        } else if id >= HOTKEY_RES_BASE {
            Some(Self::resolution((id - HOTKEY_RES_BASE) as usize))
        } else {
            None
        }
    }
}

/// A configured shortcut ready for registration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HotkeyBinding {
    pub id: i32,
    pub spec: HotkeySpec,
    pub action: DisplayAction,
}

/// Parse every configured hotkey into bindings.
///
/// Entries with no shortcut are skipped silently; entries whose shortcut
/// fails to parse are logged and skipped.
pub fn build_bindings(config: &AppConfig) -> Vec<HotkeyBinding> {
    let resolutions = config.resolutions.iter().enumerate().map(|(i, entry)| {
        (
            HotkeyTarget::resolution(i),
            entry.hotkey.as_str(),
            DisplayAction::SetResolution(entry.resolution),
        )
    });
    let rates = config.refresh_rates.iter().enumerate().map(|(i, entry)| {
        (
            HotkeyTarget::refresh_rate(i),
            entry.hotkey.as_str(),
            DisplayAction::SetRefreshRate(entry.rate),
        )
    });

    let mut bindings = Vec::new();
    for (target, text, action) in resolutions.chain(rates) {
        let spec = match parse_hotkey(text) {
            Ok(Some(spec)) => spec,
            Ok(None) => continue,
            Err(e) => {
                warn!(hotkey = text, %action, "skipping hotkey: {}", e);
                continue;
            }
        };

        let Some(id) = target.id() else {
            warn!(hotkey = text, %action, "skipping hotkey: too many entries for the id range");
            continue;
        };

        bindings.push(HotkeyBinding { id, spec, action });
    }

    bindings
}

/// id -> action lookup used by the hotkey dispatcher
///
/// Only ids that were actually registered resolve; anything else (an entry
/// without a shortcut, a failed registration, an id beyond the configured
/// lists) is a no-op.
#[derive(Debug, Clone, Default)]
pub struct BindingTable {
    resolutions: Vec<Resolution>,
    rates: Vec<RefreshRate>,
    registered: HashSet<i32>,
}

impl BindingTable {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            resolutions: config.resolutions.iter().map(|e| e.resolution).collect(),
            rates: config.refresh_rates.iter().map(|e| e.rate).collect(),
            registered: HashSet::new(),
        }
    }

    /// Record that `id` is live at the OS level
    pub fn mark_registered(&mut self, id: i32) {
        self.registered.insert(id);
    }

    pub fn is_registered(&self, id: i32) -> bool {
        self.registered.contains(&id)
    }

    /// Action for a target, if its index is within the configured list
    pub fn action_for(&self, target: HotkeyTarget) -> Option<DisplayAction> {
        match target.kind {
            HotkeyKind::Resolution => self
                .resolutions
                .get(target.index)
                .map(|r| DisplayAction::SetResolution(*r)),
            HotkeyKind::RefreshRate => self
                .rates
                .get(target.index)
                .map(|r| DisplayAction::SetRefreshRate(*r)),
        }
    }

    /// Action for a fired hotkey id
    pub fn resolve(&self, id: i32) -> Option<DisplayAction> {
        if !self.is_registered(id) {
            return None;
        }
        HotkeyTarget::from_id(id).and_then(|target| self.action_for(target))
    }
}
