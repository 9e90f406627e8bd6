//! Resolution Changer - System Tray Process
//!
//! This process manages:
//! - System tray icon with one check item per configured mode
//! - Global hotkeys for the same modes (dedicated listener thread)
//! - One worker thread per menu entry plus one for hotkeys
//! - A poll loop that catches display changes made by other programs
//! - Win32 message loop for tray icon events

#![windows_subsystem = "windows"]

use anyhow::Result;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        "Resolution Changer starting..."
    );

    run()
}

#[cfg(not(windows))]
fn run() -> Result<()> {
    anyhow::bail!("Resolution Changer is only supported on Windows")
}

#[cfg(windows)]
fn run() -> Result<()> {
    use anyhow::Context;
    use crossbeam::channel::{unbounded, Sender};
    use resolution_changer::config;
    use resolution_changer::coordinator::{spawn_action_worker, Coordinator};
    use resolution_changer::display::{
        unsupported_entries, DisplayAction, DisplayBackend, Win32Display,
    };
    use resolution_changer::hotkey::HotkeyThread;
    use resolution_changer::poller::spawn_poll_loop;
    use resolution_changer::tray::{TrayCommand, TrayManager};
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::time::Duration;
    use tray_icon::menu::{MenuEvent, MenuId};
    use windows::Win32::UI::WindowsAndMessaging::*;

    // Load configuration
    let (app_config, config_path) = config::load_config(&config::candidate_paths());

    // Create tray menu; check updates flow back to this thread as commands
    let (command_tx, command_rx) = unbounded::<TrayCommand>();
    let (mut tray, entries) =
        TrayManager::new(&app_config, command_tx).context("Failed to create tray manager")?;

    let coordinator = Arc::new(Coordinator::new(
        Win32Display::new(),
        entries.resolutions,
        entries.rates,
    ));

    // Warn about configured modes the display does not list
    let supported = coordinator.display().supported_modes();
    let configured_res: Vec<_> = app_config.resolutions.iter().map(|e| e.resolution).collect();
    let configured_rates: Vec<_> = app_config.refresh_rates.iter().map(|e| e.rate).collect();
    let (missing_res, missing_rates) =
        unsupported_entries(&supported, &configured_res, &configured_rates);
    for res in missing_res {
        tracing::warn!(resolution = %res, "configured resolution is not reported by the display");
    }
    for rate in missing_rates {
        tracing::warn!(rate = %rate, "configured refresh rate is not reported by the display");
    }

    // Initial state: mark current resolution / refresh rate
    if let Err(e) = coordinator.startup() {
        tracing::error!("Failed to read initial display state: {}", e);
    }

    // One worker per menu entry
    let mut item_senders: HashMap<MenuId, Sender<DisplayAction>> = HashMap::new();
    for (id, action) in tray.item_actions() {
        let (tx, rx) = unbounded();
        spawn_action_worker(&format!("menu {}", action), Arc::clone(&coordinator), rx)
            .context("Failed to spawn menu worker")?;
        item_senders.insert(id.clone(), tx);
    }

    // Hotkeys: listener thread -> hotkey worker
    let (hotkey_tx, hotkey_rx) = unbounded();
    spawn_action_worker("hotkey-dispatch", Arc::clone(&coordinator), hotkey_rx)
        .context("Failed to spawn hotkey worker")?;
    let mut hotkeys = match HotkeyThread::spawn(&app_config, hotkey_tx) {
        Ok(thread) => Some(thread),
        Err(e) => {
            tracing::error!("Hotkeys disabled: {}", e);
            None
        }
    };

    // "listener": poll for external changes
    spawn_poll_loop(Arc::clone(&coordinator), app_config.poll_interval)
        .context("Failed to spawn poll loop")?;

    let (menu_tx, menu_rx) = unbounded::<MenuEvent>();
    MenuEvent::set_event_handler(Some(move |event| {
        let _ = menu_tx.send(event);
    }));

    tracing::info!("Event handlers set, entering message loop");

    // Main Win32 message loop
    let mut msg = MSG::default();
    'pump: loop {
        // Pump Windows messages (required for tray icon events)
        while unsafe { PeekMessageW(&mut msg, None, 0, 0, PM_REMOVE) }.as_bool() {
            if msg.message == WM_QUIT {
                tracing::info!("WM_QUIT received, exiting");
                break 'pump;
            }
            unsafe {
                TranslateMessage(&msg);
                DispatchMessageW(&msg);
            }
        }

        // Apply checkmark updates in the order the coordinator wrote them
        while let Ok(command) = command_rx.try_recv() {
            tray.apply(command);
        }

        // Process menu clicks
        while let Ok(event) = menu_rx.try_recv() {
            if event.id == tray.menu_item_exit {
                tracing::info!("Exit menu clicked");
                break 'pump;
            } else if event.id == tray.menu_item_open_config {
                tracing::info!("Open config menu clicked");
                match config::ensure_editable_config(config_path.as_deref(), &app_config) {
                    Ok(path) => {
                        if let Err(e) = open::that(&path) {
                            tracing::error!("Failed to open {}: {}", path.display(), e);
                        }
                    }
                    Err(e) => tracing::error!("Failed to prepare config file: {}", e),
                }
            } else if let Some(action) = tray.route_click(&event.id) {
                if let Some(sender) = item_senders.get(&event.id) {
                    let _ = sender.send(action);
                }
            }
        }

        // Small sleep to avoid busy-waiting
        std::thread::sleep(Duration::from_millis(10));
    }

    if let Some(thread) = hotkeys.as_mut() {
        thread.request_shutdown();
    }

    tracing::info!("Resolution Changer stopped");
    Ok(())
}
