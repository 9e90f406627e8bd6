/// Configuration module for Resolution Changer.
///
/// This module provides functionality for loading the user's mode list,
/// including:
/// - Parsing the INI-style `config.ini` (resolutions, refresh rates, hotkeys)
/// - Locating the file next to the executable or in the per-user config
///   directory (%APPDATA%/ResolutionChanger/config/ on Windows)
/// - Falling back to built-in defaults when no usable file exists
///
/// # Example
///
/// ```ini
/// [Resolutions]
/// 2560x1600 = Ctrl+F1
/// 2560x1440          ; no hotkey
///
/// [RefreshRates]
/// 240 = Alt+F1
/// 60
///
/// [General]
/// PollInterval = 2
/// ```
use crate::display::{RefreshRate, Resolution};
use directories::ProjectDirs;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

pub const CONFIG_FILE_NAME: &str = "config.ini";

/// How often the poll loop re-reads the display when the config is silent
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// A resolution menu entry and its optional shortcut text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionEntry {
    pub resolution: Resolution,
    /// Raw hotkey text, empty when no shortcut is configured
    pub hotkey: String,
}

impl ResolutionEntry {
    pub fn new(resolution: Resolution, hotkey: &str) -> Self {
        Self {
            resolution,
            hotkey: hotkey.to_string(),
        }
    }
}

/// A refresh-rate menu entry and its optional shortcut text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateEntry {
    pub rate: RefreshRate,
    /// Raw hotkey text, empty when no shortcut is configured
    pub hotkey: String,
}

impl RateEntry {
    pub fn new(rate: RefreshRate, hotkey: &str) -> Self {
        Self {
            rate,
            hotkey: hotkey.to_string(),
        }
    }
}

/// Everything read from config.ini
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// Resolution entries in file order
    pub resolutions: Vec<ResolutionEntry>,
    /// Refresh-rate entries in file order
    pub refresh_rates: Vec<RateEntry>,
    /// Interval between external-change polls
    pub poll_interval: Duration,
}

impl Default for AppConfig {
    /// Built-in modes used when no config file can be read
    fn default() -> Self {
        AppConfig {
            resolutions: vec![
                ResolutionEntry::new(Resolution::new(2560, 1600), ""),
                ResolutionEntry::new(Resolution::new(2560, 1440), ""),
            ],
            refresh_rates: vec![
                RateEntry::new(RefreshRate(240), ""),
                RateEntry::new(RefreshRate(60), ""),
            ],
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// Config loading failures
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no config.ini found (looked in {searched:?})")]
    NotFound { searched: Vec<PathBuf> },

    #[error("failed to determine user config directory")]
    NoConfigDir,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Resolutions,
    RefreshRates,
    General,
    Other,
}

impl Section {
    fn from_header(name: &str) -> Self {
        let name = name.trim();
        if name.eq_ignore_ascii_case("Resolutions") {
            Section::Resolutions
        } else if name.eq_ignore_ascii_case("RefreshRates") {
            Section::RefreshRates
        } else if name.eq_ignore_ascii_case("General") {
            Section::General
        } else {
            Section::Other
        }
    }
}

/// Split `2560x1600 = Ctrl+F1` into (`2560x1600`, `Ctrl+F1`).
/// Without an `=` the hotkey is empty.
fn split_key_value(line: &str) -> (&str, &str) {
    match line.split_once('=') {
        Some((value, hotkey)) => (value.trim(), hotkey.trim()),
        None => (line.trim(), ""),
    }
}

fn strip_comment(line: &str) -> &str {
    let line = line.split(';').next().unwrap_or_default();
    line.split('#').next().unwrap_or_default().trim()
}

fn parse_resolution(value: &str) -> Option<Resolution> {
    let (w, h) = value.split_once(['x', 'X'])?;
    let width = w.trim().parse().ok()?;
    let height = h.trim().parse().ok()?;
    Some(Resolution::new(width, height))
}

/// Parse config.ini contents. Malformed lines are logged and skipped.
pub fn parse_config(text: &str) -> AppConfig {
    let mut config = AppConfig {
        resolutions: Vec::new(),
        refresh_rates: Vec::new(),
        poll_interval: DEFAULT_POLL_INTERVAL,
    };
    let mut section = Section::Other;

    for raw in text.lines() {
        let line = strip_comment(raw.trim());
        if line.is_empty() {
            continue;
        }

        if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            section = Section::from_header(name);
            continue;
        }

        match section {
            Section::Resolutions => {
                let (value, hotkey) = split_key_value(line);
                match parse_resolution(value) {
                    Some(resolution)
                        if config.resolutions.iter().any(|e| e.resolution == resolution) =>
                    {
                        warn!(line, "duplicate resolution entry, keeping the first")
                    }
                    Some(resolution) => config
                        .resolutions
                        .push(ResolutionEntry::new(resolution, hotkey)),
                    None => warn!(line, "invalid resolution line"),
                }
            }
            Section::RefreshRates => {
                let (value, hotkey) = split_key_value(line);
                match value.parse::<u32>().map(RefreshRate) {
                    Ok(rate) if config.refresh_rates.iter().any(|e| e.rate == rate) => {
                        warn!(line, "duplicate refresh rate entry, keeping the first")
                    }
                    Ok(rate) => config.refresh_rates.push(RateEntry::new(rate, hotkey)),
                    Err(_) => warn!(line, "invalid refresh rate"),
                }
            }
            Section::General => {
                let (key, value) = split_key_value(line);
                if key.eq_ignore_ascii_case("PollInterval") {
                    match value.parse::<u64>() {
                        Ok(secs) if secs >= 1 => {
                            config.poll_interval = Duration::from_secs(secs)
                        }
                        _ => warn!(line, "invalid poll interval, keeping default"),
                    }
                }
            }
            Section::Other => {}
        }
    }

    config
}

/// Read and parse a specific config file
pub fn load_config_from(path: &Path) -> Result<AppConfig, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(parse_config(&contents))
}

/// Get the per-user config directory
/// Returns %APPDATA%/ResolutionChanger/config/ on Windows
pub fn get_config_directory() -> Result<PathBuf, ConfigError> {
    ProjectDirs::from("", "", "ResolutionChanger")
        .map(|dirs| dirs.config_dir().to_path_buf())
        .ok_or(ConfigError::NoConfigDir)
}

/// Where config.ini is looked for, in priority order
pub fn candidate_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    if let Some(dir) = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
    {
        paths.push(dir.join(CONFIG_FILE_NAME));
    }
    if let Ok(dir) = get_config_directory() {
        paths.push(dir.join(CONFIG_FILE_NAME));
    }
    paths.push(PathBuf::from(CONFIG_FILE_NAME));

    paths
}

/// First candidate that exists
pub fn find_config(candidates: &[PathBuf]) -> Result<PathBuf, ConfigError> {
    candidates
        .iter()
        .find(|p| p.is_file())
        .cloned()
        .ok_or_else(|| ConfigError::NotFound {
            searched: candidates.to_vec(),
        })
}

/// Load configuration from the first config.ini found.
/// Returns the built-in defaults (and no path) if none can be read.
pub fn load_config(candidates: &[PathBuf]) -> (AppConfig, Option<PathBuf>) {
    let loaded = find_config(candidates)
        .and_then(|path| load_config_from(&path).map(|config| (config, path)));

    match loaded {
        Ok((config, path)) => {
            info!(
                path = %path.display(),
                resolutions = config.resolutions.len(),
                refresh_rates = config.refresh_rates.len(),
                "configuration loaded"
            );
            (config, Some(path))
        }
        Err(e) => {
            warn!("using built-in defaults: {}", e);
            (AppConfig::default(), None)
        }
    }
}

/// Render a config back into config.ini form
pub fn render_config(config: &AppConfig) -> String {
    fn line(value: String, hotkey: &str) -> String {
        if hotkey.is_empty() {
            format!("{}\n", value)
        } else {
            format!("{} = {}\n", value, hotkey)
        }
    }

    let mut out = String::from(
        "; Resolution Changer\n\
         ; WIDTHxHEIGHT = hotkey, HZ = hotkey (hotkey optional)\n\
         \n\
         [Resolutions]\n",
    );
    for entry in &config.resolutions {
        out.push_str(&line(entry.resolution.to_string(), &entry.hotkey));
    }
    out.push_str("\n[RefreshRates]\n");
    for entry in &config.refresh_rates {
        out.push_str(&line(entry.rate.hz().to_string(), &entry.hotkey));
    }
    out.push_str(&format!(
        "\n[General]\nPollInterval = {}\n",
        config.poll_interval.as_secs()
    ));
    out
}

/// Path to open for editing, writing a template there if nothing exists yet.
/// Prefers the file the running config was loaded from.
pub fn ensure_editable_config(
    loaded_from: Option<&Path>,
    config: &AppConfig,
) -> Result<PathBuf, ConfigError> {
    if let Some(path) = loaded_from {
        return Ok(path.to_path_buf());
    }

    let dir = get_config_directory()?;
    let path = dir.join(CONFIG_FILE_NAME);
    if !path.exists() {
        fs::create_dir_all(&dir).map_err(|source| ConfigError::Io {
            path: dir.clone(),
            source,
        })?;
        fs::write(&path, render_config(config)).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;
        info!(path = %path.display(), "wrote config template");
    }
    Ok(path)
}
