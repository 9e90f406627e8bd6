//! Display mode types and the backend boundary
//!
//! Defines what a display mode is (`Resolution`, `RefreshRate`,
//! `DisplayState`), the change requests the tray and hotkeys issue
//! (`DisplayAction`), and the `DisplayBackend` trait the coordinator uses to
//! read and change the primary display.

#[cfg(windows)]
mod win32;

#[cfg(windows)]
pub use win32::Win32Display;

use std::fmt;

/// Screen resolution in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Refresh rate in hertz
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RefreshRate(pub u32);

impl RefreshRate {
    pub fn hz(self) -> u32 {
        self.0
    }
}

impl fmt::Display for RefreshRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}hz", self.0)
    }
}

/// What the primary display is currently running
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayState {
    pub resolution: Resolution,
    pub rate: RefreshRate,
}

impl DisplayState {
    pub const fn new(resolution: Resolution, rate: RefreshRate) -> Self {
        Self { resolution, rate }
    }
}

impl fmt::Display for DisplayState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.resolution, self.rate)
    }
}

/// A mode change requested by a menu click or a hotkey
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayAction {
    SetResolution(Resolution),
    SetRefreshRate(RefreshRate),
}

impl fmt::Display for DisplayAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisplayAction::SetResolution(res) => write!(f, "resolution {}", res),
            DisplayAction::SetRefreshRate(rate) => write!(f, "refresh rate {}", rate),
        }
    }
}

/// Errors reported by a display backend
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DisplayError {
    #[error("failed to read current display mode: {0}")]
    Read(String),

    #[error("failed to change {target}: {reason}")]
    Change { target: String, reason: String },
}

/// Access to the OS display mode APIs
///
/// Implementations are called from several threads at once (menu workers,
/// the hotkey worker and the poll loop) and must not hold any lock shared
/// with the coordinator.
pub trait DisplayBackend: Send + Sync {
    /// Read the current resolution and refresh rate of the primary display
    fn current_display(&self) -> Result<DisplayState, DisplayError>;

    /// Switch the primary display to `resolution`, keeping the refresh rate
    fn change_resolution(&self, resolution: Resolution) -> Result<(), DisplayError>;

    /// Switch the primary display to `rate`, keeping the resolution
    fn change_refresh_rate(&self, rate: RefreshRate) -> Result<(), DisplayError>;

    /// Every mode the primary display reports as supported.
    ///
    /// Used only for the startup audit of configured entries, so backends
    /// that cannot enumerate modes may return an empty list.
    fn supported_modes(&self) -> Vec<DisplayState> {
        Vec::new()
    }

    /// Apply a menu or hotkey request
    fn apply(&self, action: DisplayAction) -> Result<(), DisplayError> {
        match action {
            DisplayAction::SetResolution(res) => self.change_resolution(res),
            DisplayAction::SetRefreshRate(rate) => self.change_refresh_rate(rate),
        }
    }
}

impl<T: DisplayBackend + ?Sized> DisplayBackend for std::sync::Arc<T> {
    fn current_display(&self) -> Result<DisplayState, DisplayError> {
        (**self).current_display()
    }

    fn change_resolution(&self, resolution: Resolution) -> Result<(), DisplayError> {
        (**self).change_resolution(resolution)
    }

    fn change_refresh_rate(&self, rate: RefreshRate) -> Result<(), DisplayError> {
        (**self).change_refresh_rate(rate)
    }

    fn supported_modes(&self) -> Vec<DisplayState> {
        (**self).supported_modes()
    }
}

/// Configured resolutions and rates the display does not list as supported
pub fn unsupported_entries(
    supported: &[DisplayState],
    resolutions: &[Resolution],
    rates: &[RefreshRate],
) -> (Vec<Resolution>, Vec<RefreshRate>) {
    if supported.is_empty() {
        return (Vec::new(), Vec::new());
    }

    let missing_res = resolutions
        .iter()
        .filter(|r| !supported.iter().any(|m| m.resolution == **r))
        .copied()
        .collect();
    let missing_rates = rates
        .iter()
        .filter(|r| !supported.iter().any(|m| m.rate == **r))
        .copied()
        .collect();

    (missing_res, missing_rates)
}
