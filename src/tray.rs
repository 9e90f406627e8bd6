/// System tray menu for the resolution and refresh-rate entries
///
/// Tray widgets live on the main thread and are not `Send`, so the
/// coordinator never touches them directly: every check/uncheck is sent as a
/// `TrayCommand` over a channel and applied by the main loop in order.
use crate::config::AppConfig;
use crate::coordinator::{MenuCheck, MenuEntry};
use crate::display::{DisplayAction, RefreshRate, Resolution};
use crate::hotkey::parse_hotkey;
use anyhow::{anyhow, Result};
use crossbeam::channel::Sender;
use std::collections::HashMap;
use tray_icon::menu::{CheckMenuItem, Menu, MenuId, MenuItem, PredefinedMenuItem};
use tray_icon::{Icon, TrayIcon, TrayIconBuilder};

const APP_NAME: &str = "Resolution Changer";

/// Load application icon from icon.ico next to the executable
fn load_app_icon() -> Result<Icon> {
    let icon_path = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(|p| p.join("icon.ico")));

    if let Some(path) = icon_path.filter(|p| p.exists()) {
        let icon_data =
            std::fs::read(&path).map_err(|e| anyhow!("Failed to read icon.ico: {}", e))?;

        let img = image::load_from_memory(&icon_data)
            .map_err(|e| anyhow!("Failed to decode icon: {}", e))?;

        let img = img.resize_exact(16, 16, image::imageops::FilterType::Lanczos3);
        let rgba = img.to_rgba8();

        return Icon::from_rgba(rgba.into_raw(), 16, 16)
            .map_err(|e| anyhow!("Failed to create icon from image: {:?}", e));
    }

    // Fallback: blue square
    let icon_rgba: Vec<u8> = (0..16 * 16)
        .flat_map(|_| [0x20, 0x60, 0xD0, 0xFF])
        .collect();
    Icon::from_rgba(icon_rgba, 16, 16)
        .map_err(|e| anyhow!("Failed to create fallback icon: {:?}", e))
}

/// Work for the main thread's tray loop
#[derive(Debug, Clone)]
pub enum TrayCommand {
    SetChecked { id: MenuId, checked: bool },
}

/// `MenuCheck` that forwards to the tray loop
#[derive(Clone)]
pub struct TrayCheckHandle {
    id: MenuId,
    commands: Sender<TrayCommand>,
}

impl MenuCheck for TrayCheckHandle {
    fn set_checked(&self, checked: bool) {
        let command = TrayCommand::SetChecked {
            id: self.id.clone(),
            checked,
        };
        if self.commands.send(command).is_err() {
            tracing::debug!("tray loop is gone, dropping check update");
        }
    }
}

/// Coordinator-facing halves of the mode entries
pub struct MenuEntries {
    pub resolutions: Vec<MenuEntry<Resolution>>,
    pub rates: Vec<MenuEntry<RefreshRate>>,
}

fn entry_label(value: &dyn std::fmt::Display, hotkey: &str) -> String {
    match parse_hotkey(hotkey) {
        Ok(Some(spec)) => format!("{}\t{}", value, spec),
        _ => value.to_string(),
    }
}

/// Tray icon manager for the mode menu
pub struct TrayManager {
    #[allow(dead_code)]
    tray_icon: TrayIcon,
    items: HashMap<MenuId, CheckMenuItem>,
    /// Last checked state written by the coordinator
    desired: HashMap<MenuId, bool>,
    actions: Vec<(MenuId, DisplayAction)>,
    pub menu_item_open_config: MenuId,
    pub menu_item_exit: MenuId,
}

impl TrayManager {
    /// Create the tray icon with one check item per configured mode
    pub fn new(config: &AppConfig, commands: Sender<TrayCommand>) -> Result<(Self, MenuEntries)> {
        tracing::info!("Creating tray icon");

        let icon = load_app_icon()?;
        let menu = Menu::new();

        let mut items = HashMap::new();
        let mut actions = Vec::new();
        let mut entries = MenuEntries {
            resolutions: Vec::new(),
            rates: Vec::new(),
        };

        for entry in &config.resolutions {
            let item = CheckMenuItem::new(
                entry_label(&entry.resolution, &entry.hotkey),
                true,
                false,
                None,
            );
            menu.append(&item)
                .map_err(|e| anyhow!("Failed to add {} item: {}", entry.resolution, e))?;

            let id = item.id().clone();
            let handle = TrayCheckHandle {
                id: id.clone(),
                commands: commands.clone(),
            };
            entries.resolutions.push(MenuEntry::new(entry.resolution, handle));
            actions.push((id.clone(), DisplayAction::SetResolution(entry.resolution)));
            items.insert(id, item);
        }

        menu.append(&PredefinedMenuItem::separator())
            .map_err(|e| anyhow!("Failed to add separator: {}", e))?;

        for entry in &config.refresh_rates {
            let item =
                CheckMenuItem::new(entry_label(&entry.rate, &entry.hotkey), true, false, None);
            menu.append(&item)
                .map_err(|e| anyhow!("Failed to add {} item: {}", entry.rate, e))?;

            let id = item.id().clone();
            let handle = TrayCheckHandle {
                id: id.clone(),
                commands: commands.clone(),
            };
            entries.rates.push(MenuEntry::new(entry.rate, handle));
            actions.push((id.clone(), DisplayAction::SetRefreshRate(entry.rate)));
            items.insert(id, item);
        }

        let open_config_item = MenuItem::new("Open config", true, None);
        let exit_item = MenuItem::new("Exit", true, None);

        menu.append(&PredefinedMenuItem::separator())
            .map_err(|e| anyhow!("Failed to add separator: {}", e))?;
        menu.append(&open_config_item)
            .map_err(|e| anyhow!("Failed to add open config item: {}", e))?;
        menu.append(&exit_item)
            .map_err(|e| anyhow!("Failed to add exit item: {}", e))?;

        let tooltip = format!("{} v{}", APP_NAME, env!("CARGO_PKG_VERSION"));
        let tray_icon = TrayIconBuilder::new()
            .with_tooltip(&tooltip)
            .with_icon(icon)
            .with_menu(Box::new(menu))
            .build()
            .map_err(|e| anyhow!("Failed to create tray icon: {}", e))?;

        tracing::info!("Tray icon created with {} mode entries", items.len());

        let desired = items.keys().map(|id| (id.clone(), false)).collect();

        Ok((
            Self {
                tray_icon,
                items,
                desired,
                actions,
                menu_item_open_config: open_config_item.id().clone(),
                menu_item_exit: exit_item.id().clone(),
            },
            entries,
        ))
    }

    /// Menu id and change request of every mode entry
    pub fn item_actions(&self) -> &[(MenuId, DisplayAction)] {
        &self.actions
    }

    /// Apply a coordinator write to the native menu
    pub fn apply(&mut self, command: TrayCommand) {
        match command {
            TrayCommand::SetChecked { id, checked } => {
                if let Some(item) = self.items.get(&id) {
                    item.set_checked(checked);
                    self.desired.insert(id, checked);
                }
            }
        }
    }

    /// Handle a click on a mode entry.
    ///
    /// Native check items flip themselves when clicked; the last state the
    /// coordinator wrote is restored so only a successful change moves the
    /// checkmark.
    pub fn route_click(&mut self, id: &MenuId) -> Option<DisplayAction> {
        let item = self.items.get(id)?;
        item.set_checked(self.desired.get(id).copied().unwrap_or(false));

        self.actions
            .iter()
            .find(|(item_id, _)| item_id == id)
            .map(|(_, action)| *action)
    }
}
