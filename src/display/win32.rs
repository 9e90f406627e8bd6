//! Primary display access through the GDI display settings API

use super::{DisplayBackend, DisplayError, DisplayState, RefreshRate, Resolution};
use tracing::debug;
use windows::core::PCWSTR;
use windows::Win32::Graphics::Gdi::{
    ChangeDisplaySettingsW, EnumDisplaySettingsW, CDS_TEST, CDS_TYPE, DEVMODEW, DISP_CHANGE,
    DISP_CHANGE_BADDUALVIEW, DISP_CHANGE_BADFLAGS, DISP_CHANGE_BADMODE, DISP_CHANGE_BADPARAM,
    DISP_CHANGE_FAILED, DISP_CHANGE_NOTUPDATED, DISP_CHANGE_RESTART, DISP_CHANGE_SUCCESSFUL,
    DM_DISPLAYFREQUENCY, DM_PELSHEIGHT, DM_PELSWIDTH, ENUM_CURRENT_SETTINGS,
    ENUM_DISPLAY_SETTINGS_MODE,
};

/// Display backend for the primary monitor
#[derive(Debug, Default, Clone, Copy)]
pub struct Win32Display;

impl Win32Display {
    pub fn new() -> Self {
        Self
    }

    fn read_mode(mode: ENUM_DISPLAY_SETTINGS_MODE) -> Option<DEVMODEW> {
        let mut devmode = DEVMODEW {
            dmSize: std::mem::size_of::<DEVMODEW>() as u16,
            ..Default::default()
        };

        let ok = unsafe { EnumDisplaySettingsW(PCWSTR::null(), mode, &mut devmode) };
        ok.as_bool().then_some(devmode)
    }

    fn current_devmode() -> Result<DEVMODEW, DisplayError> {
        Self::read_mode(ENUM_CURRENT_SETTINGS)
            .ok_or_else(|| DisplayError::Read("EnumDisplaySettingsW failed".to_string()))
    }

    /// Validate with CDS_TEST first, then apply for the current session
    fn commit(devmode: &DEVMODEW, target: String) -> Result<(), DisplayError> {
        let tested = unsafe { ChangeDisplaySettingsW(Some(devmode), CDS_TEST) };
        if tested != DISP_CHANGE_SUCCESSFUL {
            return Err(DisplayError::Change {
                target,
                reason: describe(tested),
            });
        }

        let applied = unsafe { ChangeDisplaySettingsW(Some(devmode), CDS_TYPE(0)) };
        if applied != DISP_CHANGE_SUCCESSFUL {
            return Err(DisplayError::Change {
                target,
                reason: describe(applied),
            });
        }

        debug!("display mode committed: {}", target);
        Ok(())
    }
}

fn describe(code: DISP_CHANGE) -> String {
    let name = match code {
        DISP_CHANGE_BADDUALVIEW => "DISP_CHANGE_BADDUALVIEW",
        DISP_CHANGE_BADFLAGS => "DISP_CHANGE_BADFLAGS",
        DISP_CHANGE_BADMODE => "mode not supported (DISP_CHANGE_BADMODE)",
        DISP_CHANGE_BADPARAM => "DISP_CHANGE_BADPARAM",
        DISP_CHANGE_FAILED => "driver rejected the mode (DISP_CHANGE_FAILED)",
        DISP_CHANGE_NOTUPDATED => "DISP_CHANGE_NOTUPDATED",
        DISP_CHANGE_RESTART => "restart required (DISP_CHANGE_RESTART)",
        _ => return format!("ChangeDisplaySettingsW returned {}", code.0),
    };
    name.to_string()
}

fn to_state(devmode: &DEVMODEW) -> DisplayState {
    DisplayState::new(
        Resolution::new(devmode.dmPelsWidth, devmode.dmPelsHeight),
        RefreshRate(devmode.dmDisplayFrequency),
    )
}

impl DisplayBackend for Win32Display {
    fn current_display(&self) -> Result<DisplayState, DisplayError> {
        Self::current_devmode().map(|dm| to_state(&dm))
    }

    fn change_resolution(&self, resolution: Resolution) -> Result<(), DisplayError> {
        let mut devmode = Self::current_devmode().map_err(|e| DisplayError::Change {
            target: resolution.to_string(),
            reason: e.to_string(),
        })?;

        devmode.dmPelsWidth = resolution.width;
        devmode.dmPelsHeight = resolution.height;
        devmode.dmFields = DM_PELSWIDTH | DM_PELSHEIGHT;

        Self::commit(&devmode, resolution.to_string())
    }

    fn change_refresh_rate(&self, rate: RefreshRate) -> Result<(), DisplayError> {
        let mut devmode = Self::current_devmode().map_err(|e| DisplayError::Change {
            target: rate.to_string(),
            reason: e.to_string(),
        })?;

        devmode.dmDisplayFrequency = rate.hz();
        devmode.dmFields = DM_DISPLAYFREQUENCY;

        Self::commit(&devmode, rate.to_string())
    }

    fn supported_modes(&self) -> Vec<DisplayState> {
        let mut modes: Vec<DisplayState> = Vec::new();
        let mut index = 0u32;

        while let Some(devmode) = Self::read_mode(ENUM_DISPLAY_SETTINGS_MODE(index)) {
            let state = to_state(&devmode);
            if !modes.contains(&state) {
                modes.push(state);
            }
            index += 1;
        }

        debug!("primary display reports {} distinct modes", modes.len());
        modes
    }
}
